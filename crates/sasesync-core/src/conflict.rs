// ── Conflict detection ──
//
// Classifies every graph node as new or conflicting against the
// destination inventory. Existence is an exact (kind, name, location)
// match; content is never compared. The remote API cannot filter by
// name, so whole kind/location collections are fetched once per pass
// and memoized in a pass-scoped cache.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::graph::DependencyGraph;
use crate::model::{ConfigKind, Identity, Location};

// ── Destination inventory boundary ──────────────────────────────────

/// Read side of the destination API: every name of a kind within one
/// location. Implemented by the API-client collaborator.
pub trait DestinationInventory: Send + Sync {
    fn list_names(
        &self,
        kind: ConfigKind,
        location: &Location,
    ) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send;
}

// ── Policy and resolution ───────────────────────────────────────────

/// Default handling for items that already exist at the destination,
/// applied uniformly unless a per-item override is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave the destination item untouched.
    Skip,
    /// Delete the destination item and recreate it from the snapshot.
    Overwrite,
    /// Push under `name + suffix`, rewriting references.
    Rename { suffix: String },
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Per-item outcome of conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "action")]
pub enum Resolution {
    /// No destination collision; the item will be created.
    Create,
    Skip,
    Overwrite,
    Rename { new_name: String },
}

/// One node's conflict classification and chosen resolution.
///
/// Constructed by the detector; `set_resolution` is the only mutation
/// path and enforces the skip/rename validity rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    identity: Identity,
    exists_at_destination: bool,
    resolution: Resolution,
}

impl ConflictRecord {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn exists_at_destination(&self) -> bool {
        self.exists_at_destination
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Override the resolution.
    ///
    /// `Skip` is only valid for items that exist at the destination —
    /// skipping a non-existent dependency would leave a dangling
    /// reference, so it is a validation error, not a silent no-op.
    /// `Overwrite` on a non-existent item degrades to `Create`.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CoreError> {
        match resolution {
            Resolution::Skip if !self.exists_at_destination => {
                Err(CoreError::SkipRequiresExisting {
                    identity: self.identity.clone(),
                })
            }
            Resolution::Rename { ref new_name } if new_name.is_empty() => {
                Err(CoreError::RenameRequiresName {
                    identity: self.identity.clone(),
                })
            }
            Resolution::Overwrite if !self.exists_at_destination => {
                self.resolution = Resolution::Create;
                Ok(())
            }
            resolution => {
                self.resolution = resolution;
                Ok(())
            }
        }
    }

    /// The name the item will carry at the destination.
    pub fn destination_name(&self) -> &str {
        match &self.resolution {
            Resolution::Rename { new_name } => new_name,
            _ => &self.identity.name,
        }
    }
}

/// Resolution records for one push attempt, in graph order.
#[derive(Debug, Clone, Default)]
pub struct ConflictSet {
    records: IndexMap<Identity, ConflictRecord>,
}

impl ConflictSet {
    pub fn get(&self, identity: &Identity) -> Option<&ConflictRecord> {
        self.records.get(identity)
    }

    pub fn get_mut(&mut self, identity: &Identity) -> Option<&mut ConflictRecord> {
        self.records.get_mut(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identity → new-name map for every rename resolution.
    pub fn rename_map(&self) -> HashMap<Identity, String> {
        self.records
            .values()
            .filter_map(|record| match &record.resolution {
                Resolution::Rename { new_name } => {
                    Some((record.identity.clone(), new_name.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Count of records whose item already exists at the destination.
    pub fn conflict_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.exists_at_destination)
            .count()
    }
}

impl<'a> IntoIterator for &'a ConflictSet {
    type Item = &'a ConflictRecord;
    type IntoIter = indexmap::map::Values<'a, Identity, ConflictRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

// ── Pass-scoped inventory cache ─────────────────────────────────────

/// Memoizes one destination fetch per `(kind, location)`.
///
/// Owned by a single detection pass and dropped with it; never shared
/// across push attempts.
pub struct InventoryCache<'a, P: DestinationInventory> {
    provider: &'a P,
    names: HashMap<(ConfigKind, Location), HashSet<String>>,
}

impl<'a, P: DestinationInventory> InventoryCache<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            names: HashMap::new(),
        }
    }

    /// Whether `(kind, name, location)` exists at the destination.
    pub async fn exists(&mut self, identity: &Identity) -> Result<bool, CoreError> {
        let key = (identity.kind, identity.location.clone());
        if !self.names.contains_key(&key) {
            let fetched = self
                .provider
                .list_names(identity.kind, &identity.location)
                .await?;
            debug!(
                kind = %identity.kind,
                location = %identity.location,
                count = fetched.len(),
                "fetched destination inventory"
            );
            self.names.insert(key.clone(), fetched.into_iter().collect());
        }
        Ok(self.names[&key].contains(&identity.name))
    }
}

// ── Detector ────────────────────────────────────────────────────────

/// Produce one ConflictRecord per graph node, in graph order.
///
/// Items that exist at the destination get the default policy; items
/// that do not exist resolve to `Create`. Callers may override any
/// record before planning.
pub async fn detect<P: DestinationInventory>(
    graph: &DependencyGraph,
    provider: &P,
    default_policy: &ConflictPolicy,
) -> Result<ConflictSet, CoreError> {
    let mut cache = InventoryCache::new(provider);
    let mut records = IndexMap::new();

    for identity in graph.identities() {
        let exists = cache.exists(identity).await?;
        let resolution = if exists {
            match default_policy {
                ConflictPolicy::Skip => Resolution::Skip,
                ConflictPolicy::Overwrite => Resolution::Overwrite,
                ConflictPolicy::Rename { suffix } => Resolution::Rename {
                    new_name: format!("{}{suffix}", identity.name),
                },
            }
        } else {
            Resolution::Create
        };
        records.insert(
            identity.clone(),
            ConflictRecord {
                identity: identity.clone(),
                exists_at_destination: exists,
                resolution,
            },
        );
    }

    Ok(ConflictSet { records })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ConfigKind;

    fn record(exists: bool) -> ConflictRecord {
        ConflictRecord {
            identity: Identity::global(ConfigKind::IpsecTunnel, "T-AWS"),
            exists_at_destination: exists,
            resolution: if exists {
                Resolution::Skip
            } else {
                Resolution::Create
            },
        }
    }

    #[test]
    fn skip_requires_existing_destination_item() {
        let mut fresh = record(false);
        let err = fresh.set_resolution(Resolution::Skip).unwrap_err();
        assert!(matches!(err, CoreError::SkipRequiresExisting { .. }));
        // the failed override must not change the stored resolution
        assert_eq!(fresh.resolution(), &Resolution::Create);
    }

    #[test]
    fn overwrite_on_absent_item_degrades_to_create() {
        let mut fresh = record(false);
        fresh.set_resolution(Resolution::Overwrite).unwrap();
        assert_eq!(fresh.resolution(), &Resolution::Create);
    }

    #[test]
    fn rename_requires_a_name() {
        let mut existing = record(true);
        let err = existing
            .set_resolution(Resolution::Rename { new_name: String::new() })
            .unwrap_err();
        assert!(matches!(err, CoreError::RenameRequiresName { .. }));

        existing
            .set_resolution(Resolution::Rename { new_name: "T-AWS-DR".into() })
            .unwrap();
        assert_eq!(existing.destination_name(), "T-AWS-DR");
    }
}
