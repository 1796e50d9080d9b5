//! Policy-sync engine between two tenants' configuration APIs.
//!
//! This crate owns the business logic for the sasesync workspace: it
//! turns a captured source-tenant snapshot plus a selection into a
//! validated, ordered push against a destination tenant.
//!
//! - **[`Snapshot`]** — identity-keyed, read-only index over a captured
//!   configuration set ([`snapshot`]).
//!
//! - **[`GraphBuilder`]** — expands a leaf-level selection into its
//!   transitive dependency closure ([`graph`]), using the per-kind
//!   reference-extraction rules in [`rules`]. Unresolvable references
//!   become warnings; non-transferable chains are excluded and
//!   reported.
//!
//! - **[`conflict::detect`]** — classifies every graph node against the
//!   destination inventory and carries per-item resolutions
//!   (skip / overwrite / rename).
//!
//! - **[`rewrite::rewrite_items`]** — applies rename resolutions to
//!   item payloads, including references embedded in quoted match
//!   expressions.
//!
//! - **[`plan::plan`]** — produces deterministic delete/create orders
//!   via topological sort, failing fast on dependency cycles.
//!
//! - **[`push::start`]** — executes the plan with bounded concurrency,
//!   propagating per-item failures to dependents without aborting the
//!   attempt. Observable through [`PushHandle`].
//!
//! - **[`RemoteDestination`]** — binds the destination traits to the
//!   `sasesync-api` client.

pub mod config;
pub mod conflict;
pub mod error;
pub mod graph;
pub mod model;
pub mod plan;
pub mod push;
pub mod remote;
pub mod rewrite;
pub mod rules;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{TenantConfig, TlsVerification};
pub use conflict::{
    ConflictPolicy, ConflictRecord, ConflictSet, DestinationInventory, Resolution,
};
pub use error::CoreError;
pub use graph::{BlockedItem, DependencyGraph, DependencyNode, ExternalDependency, GraphBuilder};
pub use model::{ConfigItem, ConfigKind, FieldPath, Identity, Location, RefStyle, Reference};
pub use plan::{PlanOptions, PushPlan};
pub use push::{
    DestinationMutator, NullProgress, ProgressSink, PushHandle, PushOptions, PushPhase,
    PushReport, PushResult, PushStatus,
};
pub use remote::RemoteDestination;
pub use rewrite::RenameMap;
pub use rules::RuleSet;
pub use snapshot::{Snapshot, SnapshotFile};
