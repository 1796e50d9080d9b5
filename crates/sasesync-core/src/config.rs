// ── Runtime connection configuration ──
//
// These types describe *how* to reach a tenant's configuration API.
// They carry credential data and connection tuning, but never touch
// disk. The CLI constructs a `TenantConfig` and hands it in.

use std::time::Duration;

use sasesync_api::{TenantClient, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;
use crate::remote::RemoteDestination;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for SaaS tenants.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (tenants behind TLS-intercepting proxies).
    DangerAcceptInvalid,
}

/// Connection settings for a single tenant.
///
/// Built by the CLI from file/env config -- core never reads config
/// files itself.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// API base URL (e.g. `https://api.example.com`).
    pub url: Url,
    /// Tenant identifier sent as `X-Tenant-Id`.
    pub tenant_id: String,
    /// API key sent as `X-API-KEY`.
    pub api_key: SecretString,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Page size for inventory listing.
    pub page_limit: u32,
}

impl TenantConfig {
    fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    /// Build the API client for this tenant.
    pub fn client(&self) -> Result<TenantClient, CoreError> {
        TenantClient::from_api_key(
            self.url.as_str(),
            &self.api_key,
            &self.tenant_id,
            &self.transport(),
        )
        .map_err(CoreError::from)
    }

    /// Build the destination adapter for this tenant.
    pub fn destination(&self) -> Result<RemoteDestination, CoreError> {
        Ok(RemoteDestination::new(self.client()?).with_page_limit(self.page_limit))
    }
}
