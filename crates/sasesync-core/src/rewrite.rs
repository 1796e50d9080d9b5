// ── Reference rewriting ──
//
// Given a rename map, rewrites every reference field across the
// selection to point at the new names, through arbitrarily nested
// payloads. Total (no surviving reference names a renamed identity)
// and idempotent; untouched items come back unchanged.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::conflict::ConflictSet;
use crate::error::CoreError;
use crate::graph::DependencyGraph;
use crate::model::{ConfigItem, Identity, RefStyle};
use crate::rules::RuleSet;

// ── RenameMap ───────────────────────────────────────────────────────

/// Validated `identity -> new name` map for one push attempt.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    map: HashMap<Identity, String>,
}

impl RenameMap {
    /// Validate raw entries against the graph.
    ///
    /// Every renamed identity must be a graph node, and no two items of
    /// one `(kind, location)` may end up sharing a name — neither with
    /// each other nor with an existing, un-renamed node.
    pub fn new(
        entries: HashMap<Identity, String>,
        graph: &DependencyGraph,
    ) -> Result<Self, CoreError> {
        let mut claimed: HashMap<Identity, Identity> = HashMap::new();

        for (identity, new_name) in &entries {
            if !graph.contains(identity) {
                return Err(CoreError::RenameUnknownIdentity {
                    identity: identity.clone(),
                });
            }
            if new_name.is_empty() {
                return Err(CoreError::RenameRequiresName {
                    identity: identity.clone(),
                });
            }

            let future = Identity::new(identity.kind, new_name.clone(), identity.location.clone());
            if let Some(existing) = claimed.insert(future.clone(), identity.clone()) {
                return Err(CoreError::RenameCollision {
                    identity: identity.clone(),
                    new_name: new_name.clone(),
                    existing,
                });
            }
            // A graph node already carrying the target name (and not
            // itself renamed away from it) also collides.
            if graph.contains(&future) && !entries.contains_key(&future) {
                return Err(CoreError::RenameCollision {
                    identity: identity.clone(),
                    new_name: new_name.clone(),
                    existing: future,
                });
            }
        }

        Ok(Self { map: entries })
    }

    /// Extract the rename map from a resolved conflict set.
    pub fn from_conflicts(
        conflicts: &ConflictSet,
        graph: &DependencyGraph,
    ) -> Result<Self, CoreError> {
        Self::new(conflicts.rename_map(), graph)
    }

    pub fn get(&self, identity: &Identity) -> Option<&str> {
        self.map.get(identity).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

// ── Rewriter ────────────────────────────────────────────────────────

/// Rewrite every item in the graph against the rename map.
///
/// Returns the full item set keyed by *original* identity, in graph
/// order. Items not touched by any rename are exact clones of their
/// snapshot form.
pub fn rewrite_items(
    graph: &DependencyGraph,
    renames: &RenameMap,
    rules: &RuleSet,
) -> IndexMap<Identity, ConfigItem> {
    let mut out = IndexMap::with_capacity(graph.len());

    for (identity, node) in graph.nodes() {
        let mut item = node.item.clone();

        if let Some(new_name) = renames.get(identity) {
            item.name = new_name.to_owned();
            // Payloads usually embed their own name; keep it in sync.
            if let Some(slot) = item.fields.get_mut("name") {
                *slot = Value::String(new_name.to_owned());
            }
        }

        if !renames.is_empty() {
            rewrite_references(&mut item, node, renames, rules);
        }

        out.insert(identity.clone(), item);
    }

    debug!(items = out.len(), renames = renames.len(), "reference rewrite complete");
    out
}

fn rewrite_references(
    item: &mut ConfigItem,
    node: &crate::graph::DependencyNode,
    renames: &RenameMap,
    rules: &RuleSet,
) {
    // Extraction runs on the original payload shape; the rename only
    // changes leaf string values, never structure, so paths stay valid.
    for reference in rules.references(&node.item) {
        // Resolve the reference the same way the builder did: first
        // candidate kind that is a graph node (renamed or not) wins.
        let resolved = reference.kinds.iter().find_map(|kind| {
            let candidate = reference.candidate_identity(*kind, &item.location);
            if renames.get(&candidate).is_some() || node.requires.contains(&candidate) {
                Some(candidate)
            } else {
                None
            }
        });

        let Some(target) = resolved else { continue };
        let Some(new_name) = renames.get(&target) else {
            continue;
        };

        let Some(slot) = reference.path.lookup_mut(&mut item.fields) else {
            continue;
        };

        match reference.style {
            RefStyle::Exact => {
                *slot = Value::String(new_name.to_owned());
            }
            RefStyle::Quoted => {
                if let Value::String(expr) = slot {
                    *expr = replace_quoted(expr, &reference.name, new_name);
                }
            }
        }
    }
}

/// Replace every quoted occurrence of `old` with `new`, preserving the
/// quote character. Unquoted occurrences (substrings of other names)
/// are left alone.
fn replace_quoted(expr: &str, old: &str, new: &str) -> String {
    expr.replace(&format!("'{old}'"), &format!("'{new}'"))
        .replace(&format!("\"{old}\""), &format!("\"{new}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_replacement_preserves_quote_style() {
        assert_eq!(
            replace_quoted("'a' and \"a\" or 'ab'", "a", "z"),
            "'z' and \"z\" or 'ab'"
        );
    }
}
