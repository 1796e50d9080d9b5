// ── Dependency graph builder ──
//
// Expands an explicit leaf-level selection to its transitive closure
// under the "requires" relation, restricted to items present in the
// snapshot. External references become warnings; non-transferable
// items and everything that depends on them are excluded and reported.

use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ConfigItem, FieldPath, Identity};
use crate::rules::RuleSet;
use crate::snapshot::Snapshot;

// ── Graph types ─────────────────────────────────────────────────────

/// One resolved item plus its adjacency.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub item: ConfigItem,
    /// Identities this node needs present before it can be created.
    pub requires: IndexSet<Identity>,
    /// Reverse edges, for deletion ordering and blockage propagation.
    pub required_by: IndexSet<Identity>,
    /// Whether the node came from the user's selection (vs. pulled in
    /// as a dependency).
    pub selected: bool,
}

/// A reference whose target is absent from the snapshot. Assumed to
/// pre-exist at the destination; surfaced as a warning, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDependency {
    pub referrer: Identity,
    pub target: Identity,
    pub path: FieldPath,
}

/// An item excluded from the graph because it depends (directly or
/// transitively) on a non-transferable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedItem {
    pub identity: Identity,
    /// The non-transferable item at the root of the blockage.
    pub blocked_by: Identity,
    pub reason: String,
}

/// Transitive closure of a selection under "requires".
///
/// Built fresh for each push attempt; never persisted.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<Identity, DependencyNode>,
    externals: Vec<ExternalDependency>,
    blocked: Vec<BlockedItem>,
}

impl DependencyGraph {
    pub fn node(&self, identity: &Identity) -> Option<&DependencyNode> {
        self.nodes.get(identity)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&Identity, &DependencyNode)> {
        self.nodes.iter()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.nodes.keys()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.nodes.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// References that could not be resolved inside the snapshot.
    pub fn externals(&self) -> &[ExternalDependency] {
        &self.externals
    }

    /// Items excluded because of non-transferable dependencies.
    pub fn blocked(&self) -> &[BlockedItem] {
        &self.blocked
    }

    /// One cycle among required nodes, if any exists.
    ///
    /// Returns the cycle as a path whose last element requires the
    /// first. Detection runs over the full node set; whether a cycle is
    /// fatal is the planner's call (skipped nodes may break it).
    pub fn find_cycle(&self) -> Option<Vec<Identity>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: IndexMap<&Identity, Color> =
            self.nodes.keys().map(|id| (id, Color::White)).collect();
        let mut stack: Vec<&Identity> = Vec::new();

        for start in self.nodes.keys() {
            if colors[start] != Color::White {
                continue;
            }
            // Iterative DFS keeping the gray path on an explicit stack.
            let mut work: Vec<(&Identity, usize)> = vec![(start, 0)];
            while let Some(&(node, edge)) = work.last() {
                if edge == 0 {
                    colors.insert(node, Color::Gray);
                    stack.push(node);
                }
                match self.nodes[node].requires.get_index(edge) {
                    Some(next) => {
                        if let Some(top) = work.last_mut() {
                            top.1 += 1;
                        }
                        match colors.get(next).copied() {
                            Some(Color::White) => work.push((next, 0)),
                            Some(Color::Gray) => {
                                // Found a back edge: slice the gray path.
                                let from = stack
                                    .iter()
                                    .position(|id| *id == next)
                                    .unwrap_or_default();
                                return Some(
                                    stack[from..].iter().map(|id| (*id).clone()).collect(),
                                );
                            }
                            _ => {}
                        }
                    }
                    None => {
                        colors.insert(node, Color::Black);
                        stack.pop();
                        work.pop();
                    }
                }
            }
        }
        None
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Breadth-first closure builder over one snapshot.
pub struct GraphBuilder<'a> {
    snapshot: &'a Snapshot,
    rules: &'a RuleSet,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(snapshot: &'a Snapshot, rules: &'a RuleSet) -> Self {
        Self { snapshot, rules }
    }

    /// Expand the selection to its full closure.
    ///
    /// The selection must be the explicit leaf-level identity set — a
    /// coarse "fully selected container" signal is never trusted here.
    pub fn build(&self, selection: &[Identity]) -> Result<DependencyGraph, CoreError> {
        let mut graph = DependencyGraph::default();
        let mut queue: VecDeque<Identity> = VecDeque::new();
        let mut non_transferable: IndexMap<Identity, String> = IndexMap::new();

        for identity in selection {
            if !self.snapshot.contains(identity) {
                return Err(CoreError::SelectionNotInSnapshot {
                    identity: identity.clone(),
                });
            }
            if graph.nodes.contains_key(identity) {
                continue;
            }
            let item = self
                .snapshot
                .lookup(identity)
                .cloned()
                .ok_or_else(|| CoreError::SelectionNotInSnapshot {
                    identity: identity.clone(),
                })?;
            graph.nodes.insert(
                identity.clone(),
                DependencyNode {
                    item,
                    requires: IndexSet::new(),
                    required_by: IndexSet::new(),
                    selected: true,
                },
            );
            queue.push_back(identity.clone());
        }

        // Breadth-first expansion; shared dependencies are deduplicated
        // by identity and only gain extra required_by edges.
        while let Some(current) = queue.pop_front() {
            let item = graph.nodes[&current].item.clone();

            if let Some(reason) = self.rules.non_transferable_reason(&item) {
                // Refused: recorded for propagation, references never
                // expanded (the item will not be pushed).
                non_transferable.insert(current.clone(), reason);
                continue;
            }

            for reference in self.rules.references(&item) {
                let resolved = reference
                    .kinds
                    .iter()
                    .map(|kind| reference.candidate_identity(*kind, &item.location))
                    .find(|candidate| self.snapshot.contains(candidate));

                let Some(target) = resolved else {
                    let assumed =
                        reference.candidate_identity(reference.kinds[0], &item.location);
                    warn!(
                        referrer = %current,
                        target = %assumed,
                        path = %reference.path,
                        "reference target absent from snapshot -- assuming it exists at destination"
                    );
                    graph.externals.push(ExternalDependency {
                        referrer: current.clone(),
                        target: assumed,
                        path: reference.path,
                    });
                    continue;
                };

                if !graph.nodes.contains_key(&target) {
                    let dep_item = self
                        .snapshot
                        .lookup(&target)
                        .cloned()
                        .ok_or_else(|| CoreError::Internal(format!(
                            "resolved reference {target} vanished from snapshot"
                        )))?;
                    graph.nodes.insert(
                        target.clone(),
                        DependencyNode {
                            item: dep_item,
                            requires: IndexSet::new(),
                            required_by: IndexSet::new(),
                            selected: false,
                        },
                    );
                    queue.push_back(target.clone());
                }

                graph.nodes[&current].requires.insert(target.clone());
                graph.nodes[&target].required_by.insert(current.clone());
            }
        }

        self.exclude_blocked(&mut graph, non_transferable);

        debug!(
            nodes = graph.len(),
            externals = graph.externals.len(),
            blocked = graph.blocked.len(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Remove non-transferable nodes and everything that transitively
    /// requires one, recording each exclusion with its root cause.
    fn exclude_blocked(
        &self,
        graph: &mut DependencyGraph,
        non_transferable: IndexMap<Identity, String>,
    ) {
        if non_transferable.is_empty() {
            return;
        }

        let mut blocked: IndexMap<Identity, (Identity, String)> = IndexMap::new();
        for (root, reason) in &non_transferable {
            let mut frontier = VecDeque::from([root.clone()]);
            let mut seen: HashSet<Identity> = HashSet::new();
            while let Some(id) = frontier.pop_front() {
                if !seen.insert(id.clone()) {
                    continue;
                }
                blocked
                    .entry(id.clone())
                    .or_insert_with(|| (root.clone(), reason.clone()));
                if let Some(node) = graph.nodes.get(&id) {
                    frontier.extend(node.required_by.iter().cloned());
                }
            }
        }

        for (identity, (blocked_by, reason)) in &blocked {
            warn!(item = %identity, blocked_by = %blocked_by, "excluding non-transferable dependency chain");
            graph.nodes.shift_remove(identity);
            graph.blocked.push(BlockedItem {
                identity: identity.clone(),
                blocked_by: blocked_by.clone(),
                reason: reason.clone(),
            });
        }

        // Drop dangling edges to removed nodes.
        for node in graph.nodes.values_mut() {
            node.requires.retain(|id| !blocked.contains_key(id));
            node.required_by.retain(|id| !blocked.contains_key(id));
        }
    }
}
