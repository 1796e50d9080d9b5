// ── Remote destination adapter ──
//
// Binds the engine's destination traits to the tenant configuration
// API client. One instance per destination tenant; shares the client's
// rate-limit gate so a 429 pauses every in-flight worker.

use sasesync_api::{RateGate, TenantClient};
use serde_json::Value;
use tracing::debug;

use crate::conflict::DestinationInventory;
use crate::error::CoreError;
use crate::model::{ConfigItem, ConfigKind, Identity, Location};
use crate::push::DestinationMutator;

const DEFAULT_PAGE_LIMIT: u32 = 200;

/// Endpoint segment for a kind, relative to the `/config/` base.
pub fn endpoint(kind: ConfigKind) -> &'static str {
    match kind {
        ConfigKind::Address => "v1/addresses",
        ConfigKind::AddressGroup => "v1/address-groups",
        ConfigKind::Service => "v1/services",
        ConfigKind::ServiceGroup => "v1/service-groups",
        ConfigKind::SecurityProfile => "v1/security-profiles",
        ConfigKind::ProfileGroup => "v1/profile-groups",
        ConfigKind::AuthenticationProfile => "v1/authentication-profiles",
        ConfigKind::HipObject => "v1/hip-objects",
        ConfigKind::HipProfile => "v1/hip-profiles",
        ConfigKind::SecurityRule => "v1/security-rules",
        ConfigKind::IkeCryptoProfile => "v1/ike-crypto-profiles",
        ConfigKind::IpsecCryptoProfile => "v1/ipsec-crypto-profiles",
        ConfigKind::IkeGateway => "v1/ike-gateways",
        ConfigKind::IpsecTunnel => "v1/ipsec-tunnels",
        ConfigKind::ServiceConnection => "v1/service-connections",
    }
}

/// Destination tenant reached over the configuration API.
pub struct RemoteDestination {
    client: TenantClient,
    gate: RateGate,
    page_limit: u32,
}

impl RemoteDestination {
    pub fn new(client: TenantClient) -> Self {
        let gate = client.gate();
        Self {
            client,
            gate,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// Request body: the item's opaque fields with the name ensured.
    fn payload(item: &ConfigItem) -> Value {
        let mut body = item.fields.clone();
        if let Value::Object(map) = &mut body {
            map.insert("name".to_owned(), Value::String(item.name.clone()));
        }
        body
    }
}

impl DestinationInventory for RemoteDestination {
    fn list_names(
        &self,
        kind: ConfigKind,
        location: &Location,
    ) -> impl std::future::Future<Output = Result<Vec<String>, CoreError>> + Send {
        async move {
            let path = endpoint(kind);
            let location = location.as_str();
            let objects = self
                .client
                .paginate_all(self.page_limit, |offset, limit| {
                    self.client.list_objects(path, location, offset, limit)
                })
                .await?;

            // Objects without a string name cannot collide by name.
            let names = objects
                .into_iter()
                .filter_map(|object| {
                    object
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .collect();
            Ok(names)
        }
    }
}

impl DestinationMutator for RemoteDestination {
    fn create(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        async move {
            self.client
                .create_object(
                    endpoint(item.kind),
                    item.location.as_str(),
                    &Self::payload(item),
                )
                .await
                .map_err(CoreError::from)
        }
    }

    fn update(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        async move {
            self.client
                .update_object(
                    endpoint(item.kind),
                    &item.name,
                    item.location.as_str(),
                    &Self::payload(item),
                )
                .await
                .map_err(CoreError::from)
        }
    }

    fn delete(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        async move {
            let result = self
                .client
                .delete_object(
                    endpoint(identity.kind),
                    &identity.name,
                    identity.location.as_str(),
                )
                .await;
            match result {
                // Already gone; the recreate can proceed.
                Err(sasesync_api::Error::NotFound { path }) => {
                    debug!(item = %identity, %path, "delete target already absent");
                    Ok(())
                }
                other => other.map_err(CoreError::from),
            }
        }
    }

    fn ready(&self) -> impl std::future::Future<Output = ()> + Send {
        self.gate.ready()
    }
}
