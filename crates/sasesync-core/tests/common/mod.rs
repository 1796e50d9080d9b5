// Shared fixtures: a realistic VPN dependency chain plus in-memory
// destination fakes for the detector and the orchestrator.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sasesync_core::{
    ConfigItem, ConfigKind, ConflictPolicy, ConflictSet, CoreError, DependencyGraph,
    DestinationInventory, DestinationMutator, GraphBuilder, Identity, Location, PushReport,
    PushStatus, RuleSet, Snapshot,
};
use serde_json::json;
use tokio::sync::Semaphore;

pub fn gid(kind: ConfigKind, name: &str) -> Identity {
    Identity::global(kind, name)
}

pub fn cid(kind: ConfigKind, name: &str, container: &str) -> Identity {
    Identity::new(kind, name, Location::container(container))
}

/// Service connection -> tunnel -> gateway -> crypto profiles.
pub fn vpn_chain_items() -> Vec<ConfigItem> {
    vec![
        ConfigItem::new(
            ConfigKind::IkeCryptoProfile,
            "IKE-Strong",
            Location::Global,
            json!({ "encryption": ["aes-256-gcm"], "dhGroup": ["group20"] }),
        ),
        ConfigItem::new(
            ConfigKind::IpsecCryptoProfile,
            "IPSEC-Strong",
            Location::Global,
            json!({ "esp": { "encryption": ["aes-256-gcm"] } }),
        ),
        ConfigItem::new(
            ConfigKind::IkeGateway,
            "GW-AWS",
            Location::Global,
            json!({
                "protocol": { "ikev2": { "ikeCryptoProfile": "IKE-Strong" } },
                "peerAddress": { "ip": "203.0.113.10" },
            }),
        ),
        ConfigItem::new(
            ConfigKind::IpsecTunnel,
            "T-AWS",
            Location::Global,
            json!({
                "autoKey": {
                    "ikeGateway": [ { "name": "GW-AWS" } ],
                    "ipsecCryptoProfile": "IPSEC-Strong",
                }
            }),
        ),
        ConfigItem::new(
            ConfigKind::ServiceConnection,
            "SC-AWS",
            Location::Global,
            json!({ "ipsecTunnel": "T-AWS", "region": "us-east-1" }),
        ),
    ]
}

pub fn vpn_snapshot() -> Snapshot {
    Snapshot::from_items(vpn_chain_items()).expect("fixture items are unique")
}

pub fn build_graph(snapshot: &Snapshot, selection: &[Identity]) -> DependencyGraph {
    GraphBuilder::new(snapshot, &RuleSet::builtin())
        .build(selection)
        .expect("fixture selection builds")
}

/// Inventory fake over a fixed set of existing identities; records
/// every fetch so tests can assert the cache memoizes.
pub struct StaticInventory {
    existing: HashSet<(ConfigKind, String, String)>,
    fetches: Mutex<Vec<(ConfigKind, String)>>,
}

impl StaticInventory {
    pub fn empty() -> Self {
        Self::with(&[])
    }

    pub fn with(existing: &[Identity]) -> Self {
        Self {
            existing: existing
                .iter()
                .map(|id| {
                    (
                        id.kind,
                        id.location.as_str().to_owned(),
                        id.name.clone(),
                    )
                })
                .collect(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().expect("fetch log lock").len()
    }
}

impl DestinationInventory for StaticInventory {
    fn list_names(
        &self,
        kind: ConfigKind,
        location: &Location,
    ) -> impl std::future::Future<Output = Result<Vec<String>, CoreError>> + Send {
        let location = location.as_str().to_owned();
        self.fetches
            .lock()
            .expect("fetch log lock")
            .push((kind, location.clone()));
        let names: Vec<String> = self
            .existing
            .iter()
            .filter(|(k, l, _)| *k == kind && *l == location)
            .map(|(_, _, name)| name.clone())
            .collect();
        async move { Ok(names) }
    }
}

/// Mutator fake that logs every call, captures created payloads, and
/// injects failures by item name.
#[derive(Default)]
pub struct RecordingDestination {
    pub log: Mutex<Vec<String>>,
    pub created: Mutex<Vec<ConfigItem>>,
    pub fail_create: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub auth_fail_create: HashSet<String>,
    /// Simulated per-call latency (virtual time under `start_paused`).
    pub delay: Option<std::time::Duration>,
    /// When set, every call waits for a permit before proceeding.
    pub hold: Option<Arc<Semaphore>>,
    /// Releases one permit as each call enters, for test sequencing.
    pub entered: Option<Arc<Semaphore>>,
    pub current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl RecordingDestination {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("call log lock").clone()
    }

    pub fn created_item(&self, name: &str) -> Option<ConfigItem> {
        self.created
            .lock()
            .expect("created log lock")
            .iter()
            .find(|item| item.name == name)
            .cloned()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        if let Some(entered) = &self.entered {
            entered.add_permits(1);
        }
        if let Some(hold) = &self.hold {
            hold.acquire().await.expect("hold semaphore open").forget();
        }
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn record(&self, entry: String) {
        self.log.lock().expect("call log lock").push(entry);
    }
}

fn api_error(message: &str) -> CoreError {
    CoreError::Api {
        message: message.to_owned(),
        code: Some("api.test.injected".to_owned()),
        status: Some(400),
    }
}

impl DestinationMutator for RecordingDestination {
    fn create(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        let item = item.clone();
        async move {
            self.enter().await;
            self.record(format!("create {}", item.name));
            if self.auth_fail_create.contains(&item.name) {
                return Err(CoreError::AuthenticationFailed {
                    message: "API key revoked".to_owned(),
                });
            }
            if self.fail_create.contains(&item.name) {
                return Err(api_error("create rejected"));
            }
            self.created.lock().expect("created log lock").push(item);
            Ok(())
        }
    }

    fn update(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        let item = item.clone();
        async move {
            self.enter().await;
            self.record(format!("update {}", item.name));
            if self.fail_create.contains(&item.name) {
                return Err(api_error("update rejected"));
            }
            self.created.lock().expect("created log lock").push(item);
            Ok(())
        }
    }

    fn delete(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send {
        let name = identity.name.clone();
        async move {
            self.enter().await;
            self.record(format!("delete {name}"));
            if self.fail_delete.contains(&name) {
                return Err(api_error("delete rejected"));
            }
            Ok(())
        }
    }

    fn ready(&self) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Graph + detected conflicts against a fixed destination inventory.
pub async fn prepare(
    snapshot: &Snapshot,
    selection: &[Identity],
    existing: &[Identity],
    policy: &ConflictPolicy,
) -> (DependencyGraph, ConflictSet) {
    let graph = build_graph(snapshot, selection);
    let inventory = StaticInventory::with(existing);
    let conflicts = sasesync_core::conflict::detect(&graph, &inventory, policy)
        .await
        .expect("detection against static inventory");
    (graph, conflicts)
}

pub fn status_of(report: &PushReport, identity: &Identity) -> PushStatus {
    report
        .results
        .iter()
        .find(|r| &r.identity == identity)
        .unwrap_or_else(|| panic!("no result for {identity}"))
        .status
}
