// ── Snapshot index ──
//
// Read-only, in-memory index over a previously captured configuration
// tree. How the capture was persisted (and whether it was encrypted)
// is the snapshot collaborator's business; the engine only sees items.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{ConfigItem, Identity};

/// Immutable identity-keyed index over one captured configuration set.
///
/// Insertion order is preserved so iteration (and everything derived
/// from it) is deterministic across runs.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    items: IndexMap<Identity, ConfigItem>,
}

impl Snapshot {
    /// Build the index, rejecting duplicate identities.
    pub fn from_items(items: impl IntoIterator<Item = ConfigItem>) -> Result<Self, CoreError> {
        let mut index = IndexMap::new();
        for item in items {
            let identity = item.identity();
            if index.insert(identity.clone(), item).is_some() {
                return Err(CoreError::DuplicateItem { identity });
            }
        }
        Ok(Self { items: index })
    }

    pub fn lookup(&self, identity: &Identity) -> Option<&ConfigItem> {
        self.items.get(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.items.contains_key(identity)
    }

    pub fn items(&self) -> impl Iterator<Item = &ConfigItem> {
        self.items.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── File format ─────────────────────────────────────────────────────

/// Serialized capture shape: `{ "items": [ … ] }` with optional
/// capture metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub captured_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub source_tenant: Option<String>,
    pub items: Vec<ConfigItem>,
}

impl SnapshotFile {
    pub fn into_snapshot(self) -> Result<Snapshot, CoreError> {
        Snapshot::from_items(self.items)
    }
}
