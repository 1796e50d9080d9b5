// ── Push planning ──
//
// Converts the dependency graph plus resolved conflict records into
// the two ordered operation lists. Fails fast on structural problems
// (cycles among non-skip nodes, invalid resolutions) before anything
// touches the network.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::conflict::{ConflictSet, Resolution};
use crate::error::CoreError;
use crate::graph::DependencyGraph;
use crate::model::{Identity, Location};
use crate::rewrite::RenameMap;

// ── Plan types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Overwrite in place via update calls instead of the two-phase
    /// delete-then-create. Leaves the delete order empty.
    pub in_place_updates: bool,
}

/// Ordered operation lists for one push attempt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPlan {
    /// Overwrite-resolved identities, dependents before dependencies.
    pub delete_order: Vec<Identity>,
    /// All non-skip identities, dependencies before dependents.
    pub create_order: Vec<Identity>,
    /// Whether overwrites patch in place rather than delete+create.
    pub in_place_updates: bool,
}

impl PushPlan {
    pub fn total_operations(&self) -> usize {
        self.delete_order.len() + self.create_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.create_order.is_empty() && self.delete_order.is_empty()
    }
}

// ── Planner ─────────────────────────────────────────────────────────

/// Build the push plan.
///
/// `create_order` is a topological sort of non-skip nodes with ties
/// broken by (kind priority, name, location), so repeated runs over
/// the same input produce the same order. `delete_order` is the
/// reverse, restricted to overwrite-resolved nodes.
pub fn plan(
    graph: &DependencyGraph,
    conflicts: &ConflictSet,
    options: PlanOptions,
) -> Result<PushPlan, CoreError> {
    // Every node needs a resolution, and skip/rename validity holds
    // even for records that arrived via deserialized overrides.
    for identity in graph.identities() {
        let record = conflicts
            .get(identity)
            .ok_or_else(|| CoreError::MissingResolution {
                identity: identity.clone(),
            })?;
        match record.resolution() {
            Resolution::Skip if !record.exists_at_destination() => {
                return Err(CoreError::SkipRequiresExisting {
                    identity: identity.clone(),
                });
            }
            Resolution::Rename { new_name } if new_name.is_empty() => {
                return Err(CoreError::RenameRequiresName {
                    identity: identity.clone(),
                });
            }
            _ => {}
        }
    }

    // Rename validity (unknown identities, collisions) is structural.
    let _ = RenameMap::from_conflicts(conflicts, graph)?;

    let non_skip: HashSet<&Identity> = graph
        .identities()
        .filter(|&id| {
            conflicts
                .get(id)
                .is_some_and(|r| r.resolution() != &Resolution::Skip)
        })
        .collect();

    let create_order = topological_order(graph, &non_skip)?;

    let delete_order: Vec<Identity> = if options.in_place_updates {
        Vec::new()
    } else {
        create_order
            .iter()
            .rev()
            .filter(|&id| {
                conflicts
                    .get(id)
                    .is_some_and(|r| r.resolution() == &Resolution::Overwrite)
            })
            .cloned()
            .collect()
    };

    debug!(
        creates = create_order.len(),
        deletes = delete_order.len(),
        "push plan built"
    );

    Ok(PushPlan {
        delete_order,
        create_order,
        in_place_updates: options.in_place_updates,
    })
}

/// Kahn's algorithm over the non-skip subgraph with a deterministic
/// ready set.
fn topological_order(
    graph: &DependencyGraph,
    non_skip: &HashSet<&Identity>,
) -> Result<Vec<Identity>, CoreError> {
    // Sort key first so the BTreeSet pops ties deterministically.
    type OrderedId = (u8, String, Location, Identity);
    fn ordered(id: &Identity) -> OrderedId {
        (
            id.kind.push_priority(),
            id.name.clone(),
            id.location.clone(),
            id.clone(),
        )
    }

    let mut indegree: HashMap<&Identity, usize> = HashMap::new();
    for &id in non_skip {
        let node = graph
            .node(id)
            .ok_or_else(|| CoreError::Internal(format!("node {id} missing from graph")))?;
        let degree = node
            .requires
            .iter()
            .filter(|dep| non_skip.contains(dep))
            .count();
        indegree.insert(id, degree);
    }

    let mut ready: BTreeSet<OrderedId> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| ordered(id))
        .collect();

    let mut order: Vec<Identity> = Vec::with_capacity(non_skip.len());
    while let Some(entry) = ready.pop_first() {
        let (_, _, _, id) = entry;
        if let Some(node) = graph.node(&id) {
            for dependent in &node.required_by {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(ordered(dependent));
                    }
                }
            }
        }
        order.push(id);
    }

    if order.len() < non_skip.len() {
        let leftover: HashSet<&Identity> = indegree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        return Err(CoreError::CycleDetected {
            members: extract_cycle(graph, &leftover),
        });
    }

    Ok(order)
}

/// Walk `requires` edges inside the leftover set until a node repeats;
/// every leftover node has at least one unprocessed requirement, so
/// the walk always closes.
fn extract_cycle(graph: &DependencyGraph, leftover: &HashSet<&Identity>) -> Vec<Identity> {
    let Some(start) = leftover.iter().min().copied() else {
        return Vec::new();
    };

    let mut path: Vec<&Identity> = vec![start];
    let mut positions: HashMap<&Identity, usize> = HashMap::from([(start, 0)]);

    loop {
        let current = path[path.len() - 1];
        let Some(next) = graph.node(current).and_then(|node| {
            node.requires.iter().find(|dep| leftover.contains(dep))
        }) else {
            return path.into_iter().cloned().collect();
        };

        if let Some(&pos) = positions.get(next) {
            return path[pos..].iter().map(|id| (*id).clone()).collect();
        }
        positions.insert(next, path.len());
        path.push(next);
    }
}
