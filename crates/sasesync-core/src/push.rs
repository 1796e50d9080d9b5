// ── Push orchestration ──
//
// Executes a validated plan against the destination tenant: the delete
// phase first (reverse dependency order), then the create phase, each
// with bounded concurrency. A failed item never blocks the whole run;
// its dependents are skipped without issuing calls, everything else
// proceeds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conflict::{ConflictSet, Resolution};
use crate::error::CoreError;
use crate::graph::DependencyGraph;
use crate::model::{ConfigItem, Identity};
use crate::plan::PushPlan;

const DEFAULT_CONCURRENCY: usize = 4;

// ── Destination boundary ────────────────────────────────────────────

/// Write side of the destination API. Implemented by the API-client
/// collaborator; faked in tests.
pub trait DestinationMutator: Send + Sync {
    fn create(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send;

    fn update(
        &self,
        item: &ConfigItem,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send;

    fn delete(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), CoreError>> + Send;

    /// Resolves once the destination is accepting calls again. Backs
    /// the shared rate-limit gate; an open gate resolves immediately.
    fn ready(&self) -> impl std::future::Future<Output = ()> + Send;
}

// ── Progress ────────────────────────────────────────────────────────

/// Consumer-facing progress callbacks, invoked from the orchestrator
/// task as items settle.
pub trait ProgressSink: Send + Sync {
    fn phase_changed(&self, _phase: PushPhase) {}
    fn item_settled(&self, _result: &PushResult) {}
}

/// Sink that drops everything.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

// ── Result types ────────────────────────────────────────────────────

/// Lifecycle of one push attempt, observable over a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushPhase {
    NotStarted,
    Deleting,
    Creating,
    Done,
    Cancelled,
}

/// Terminal status of one item within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushStatus {
    /// Created fresh at the destination.
    Created,
    /// Existing destination item replaced (or patched in place).
    Updated,
    /// Created under a new name.
    Renamed,
    /// No call issued: skip resolution, cancellation, or abort.
    Skipped,
    /// The call for this item failed.
    Failed,
    /// No call issued because a dependency failed first.
    SkippedDueToDependencyFailure,
}

impl PushStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Renamed)
    }
}

/// One item's outcome, keyed by its *source* identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    pub identity: Identity,
    /// The name the item carries (or kept) at the destination.
    pub destination_name: String,
    pub status: PushStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Full record of one push attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushReport {
    pub attempt_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<PushResult>,
    /// Set when the attempt was cancelled before completion.
    pub cancelled: bool,
    /// Set when a structural failure (auth, transport) stopped the
    /// attempt early; carries the failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl PushReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    PushStatus::Failed | PushStatus::SkippedDueToDependencyFailure
                )
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == PushStatus::Skipped)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.aborted.is_none() && self.failed() == 0
    }
}

// ── Options and handle ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
    /// Maximum in-flight destination calls per phase.
    pub concurrency: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Handle to a running push attempt.
///
/// The attempt runs on its own task; the handle observes phase and
/// per-item status, can cancel, and finally yields the report.
pub struct PushHandle {
    cancel: CancellationToken,
    phase_rx: watch::Receiver<PushPhase>,
    statuses: Arc<DashMap<Identity, PushStatus>>,
    task: JoinHandle<PushReport>,
}

impl PushHandle {
    /// Request cancellation. In-flight calls finish; nothing new starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn phase(&self) -> PushPhase {
        *self.phase_rx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<PushPhase> {
        self.phase_rx.clone()
    }

    /// Live status of one item, once it has settled.
    pub fn status(&self, identity: &Identity) -> Option<PushStatus> {
        self.statuses.get(identity).map(|entry| *entry.value())
    }

    /// Wait for the attempt to finish and take the report.
    pub async fn wait(self) -> Result<PushReport, CoreError> {
        self.task
            .await
            .map_err(|err| CoreError::Internal(format!("push task panicked: {err}")))
    }
}

// ── Entry point ─────────────────────────────────────────────────────

/// Spawn a push attempt for an already-validated plan.
///
/// `items` is the rewritten item set keyed by source identity (the
/// rewriter's output); every identity in the plan must be present.
pub fn start<M>(
    graph: &DependencyGraph,
    plan: &PushPlan,
    conflicts: &ConflictSet,
    items: IndexMap<Identity, ConfigItem>,
    destination: Arc<M>,
    progress: Arc<dyn ProgressSink>,
    options: PushOptions,
) -> Result<PushHandle, CoreError>
where
    M: DestinationMutator + 'static,
{
    for identity in &plan.create_order {
        if !items.contains_key(identity) {
            return Err(CoreError::Internal(format!(
                "planned item {identity} missing from rewritten set"
            )));
        }
    }

    let mut resolutions = HashMap::new();
    let mut requires: HashMap<Identity, IndexSet<Identity>> = HashMap::new();
    let mut required_by: HashMap<Identity, IndexSet<Identity>> = HashMap::new();
    for (identity, node) in graph.nodes() {
        let record = conflicts
            .get(identity)
            .ok_or_else(|| CoreError::MissingResolution {
                identity: identity.clone(),
            })?;
        resolutions.insert(identity.clone(), record.resolution().clone());
        requires.insert(identity.clone(), node.requires.clone());
        required_by.insert(identity.clone(), node.required_by.clone());
    }

    let cancel = CancellationToken::new();
    let (phase_tx, phase_rx) = watch::channel(PushPhase::NotStarted);
    let statuses: Arc<DashMap<Identity, PushStatus>> = Arc::new(DashMap::new());

    let executor = Executor {
        destination,
        items: Arc::new(items),
        resolutions,
        requires,
        required_by,
        plan: plan.clone(),
        options,
        progress,
        statuses: Arc::clone(&statuses),
        phase_tx,
        cancel: cancel.clone(),
    };

    let task = tokio::spawn(executor.run());

    Ok(PushHandle {
        cancel,
        phase_rx,
        statuses,
        task,
    })
}

// ── Executor ────────────────────────────────────────────────────────

enum Op {
    Delete(Identity),
    Create(ConfigItem),
    Update(ConfigItem),
}

struct Executor<M: DestinationMutator + 'static> {
    destination: Arc<M>,
    items: Arc<IndexMap<Identity, ConfigItem>>,
    resolutions: HashMap<Identity, Resolution>,
    requires: HashMap<Identity, IndexSet<Identity>>,
    required_by: HashMap<Identity, IndexSet<Identity>>,
    plan: PushPlan,
    options: PushOptions,
    progress: Arc<dyn ProgressSink>,
    statuses: Arc<DashMap<Identity, PushStatus>>,
    phase_tx: watch::Sender<PushPhase>,
    cancel: CancellationToken,
}

/// Accumulated per-attempt state shared across phases.
struct AttemptState {
    results: HashMap<Identity, PushResult>,
    /// Items whose dependency chain is broken; no further calls.
    unavailable: HashSet<Identity>,
    aborted: Option<String>,
}

impl<M: DestinationMutator + 'static> Executor<M> {
    async fn run(self) -> PushReport {
        let attempt_id = uuid::Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            attempt = %attempt_id,
            deletes = self.plan.delete_order.len(),
            creates = self.plan.create_order.len(),
            "push attempt starting"
        );

        let mut state = AttemptState {
            results: HashMap::new(),
            unavailable: HashSet::new(),
            aborted: None,
        };

        // Skip resolutions settle immediately; they never reach a phase.
        for (identity, resolution) in &self.resolutions {
            if resolution == &Resolution::Skip {
                self.settle(
                    &mut state,
                    identity.clone(),
                    PushStatus::Skipped,
                    Some("already exists at destination".to_owned()),
                );
            }
        }

        if !self.plan.delete_order.is_empty() {
            self.set_phase(PushPhase::Deleting);
            self.drive_phase(&mut state, true).await;
        }

        if state.aborted.is_none() && !self.cancel.is_cancelled() {
            self.set_phase(PushPhase::Creating);
        }
        self.drive_phase(&mut state, false).await;

        let cancelled = self.cancel.is_cancelled() && state.aborted.is_none();
        self.set_phase(if cancelled {
            PushPhase::Cancelled
        } else {
            PushPhase::Done
        });

        // Report in plan order, then skips in graph order.
        let mut results: Vec<PushResult> = Vec::with_capacity(state.results.len());
        for identity in &self.plan.create_order {
            if let Some(result) = state.results.remove(identity) {
                results.push(result);
            }
        }
        let mut rest: Vec<PushResult> = state.results.into_values().collect();
        rest.sort_by(|a, b| a.identity.cmp(&b.identity));
        results.extend(rest);

        let report = PushReport {
            attempt_id,
            started_at,
            finished_at: Utc::now(),
            results,
            cancelled,
            aborted: state.aborted,
        };
        info!(
            attempt = %attempt_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            cancelled = report.cancelled,
            "push attempt finished"
        );
        report
    }

    fn set_phase(&self, phase: PushPhase) {
        let _ = self.phase_tx.send(phase);
        self.progress.phase_changed(phase);
    }

    fn settle(
        &self,
        state: &mut AttemptState,
        identity: Identity,
        status: PushStatus,
        detail: Option<String>,
    ) {
        let destination_name = match self.resolutions.get(&identity) {
            Some(Resolution::Rename { new_name }) => new_name.clone(),
            _ => identity.name.clone(),
        };
        let result = PushResult {
            identity: identity.clone(),
            destination_name,
            status,
            detail,
        };
        self.statuses.insert(identity.clone(), status);
        self.progress.item_settled(&result);
        state.results.insert(identity, result);
    }

    /// Run one phase to completion with bounded concurrency.
    ///
    /// An item is dispatched once every in-phase dependency has settled
    /// successfully. Failures propagate to transitive dependents without
    /// issuing their calls; cancellation and structural errors stop
    /// dispatch but let in-flight calls drain.
    async fn drive_phase(&self, state: &mut AttemptState, deleting: bool) {
        let order: &[Identity] = if deleting {
            &self.plan.delete_order
        } else {
            &self.plan.create_order
        };
        if order.is_empty() {
            return;
        }
        let members: HashSet<&Identity> = order.iter().collect();

        // In-phase dependency edges. Creates wait on their requirements;
        // deletes wait on their dependents (reverse order).
        let mut deps: HashMap<&Identity, HashSet<&Identity>> = HashMap::new();
        for id in order {
            let edges = if deleting {
                self.required_by.get(id)
            } else {
                self.requires.get(id)
            };
            let within: HashSet<&Identity> = edges
                .into_iter()
                .flatten()
                .filter(|dep| members.contains(*dep))
                .collect();
            deps.insert(id, within);
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(Identity, Result<(), CoreError>)>(order.len());

        let mut dispatched: HashSet<&Identity> = HashSet::new();
        let mut settled_ok: HashSet<&Identity> = HashSet::new();
        let mut settled: HashSet<&Identity> = HashSet::new();
        let mut in_flight = 0usize;

        // Items already broken in the delete phase settle before dispatch,
        // and their breakage propagates to in-phase dependents.
        if !deleting {
            for id in order {
                if !state.unavailable.contains(id) {
                    continue;
                }
                if !state.results.contains_key(id) {
                    self.settle(
                        state,
                        id.clone(),
                        PushStatus::Skipped,
                        Some("delete phase did not complete".to_owned()),
                    );
                }
                settled.insert(id);
            }
            let broken: Vec<&Identity> = settled.iter().copied().collect();
            for id in broken {
                self.propagate_failure(state, id, deleting, &members, &mut settled);
            }
        }

        loop {
            let stop = self.cancel.is_cancelled() || state.aborted.is_some();
            if !stop {
                for id in order {
                    if dispatched.contains(id) || settled.contains(id) {
                        continue;
                    }
                    if !deps[id].iter().all(|dep| settled_ok.contains(dep)) {
                        continue;
                    }
                    let Some(op) = self.op_for(id, deleting) else {
                        // Nothing to do in this phase for this item.
                        settled_ok.insert(id);
                        settled.insert(id);
                        continue;
                    };
                    self.dispatch(id.clone(), op, &semaphore, &tx);
                    dispatched.insert(id);
                    in_flight += 1;
                }
            }

            if in_flight == 0 {
                break;
            }

            // Once dispatch has stopped, only in-flight completions
            // remain; waiting on the token again would spin forever.
            let completion = if stop {
                rx.recv().await
            } else {
                tokio::select! {
                    completion = rx.recv() => completion,
                    () = self.cancel.cancelled() => continue,
                }
            };
            let Some((identity, outcome)) = completion else {
                break;
            };
            in_flight -= 1;
            let Some(id) = members.get(&identity).copied() else {
                continue;
            };

            match outcome {
                Ok(()) => {
                    settled_ok.insert(id);
                    settled.insert(id);
                    if !deleting {
                        self.settle(state, identity, self.success_status(id), None);
                    }
                }
                Err(err) if err.aborts_push() => {
                    warn!(item = %identity, error = %err, "fatal failure -- stopping dispatch");
                    state.aborted = Some(err.to_string());
                    settled.insert(id);
                    self.fail_item(state, id, deleting, &err);
                }
                Err(err) => {
                    settled.insert(id);
                    self.fail_item(state, id, deleting, &err);
                    self.propagate_failure(state, id, deleting, &members, &mut settled);
                }
            }
        }

        // Everything never dispatched settles as skipped.
        let detail = if state.aborted.is_some() {
            "push aborted"
        } else {
            "push cancelled"
        };
        for id in order {
            if settled.contains(id) || dispatched.contains(id) {
                continue;
            }
            if !deleting {
                self.settle(
                    state,
                    (*id).clone(),
                    PushStatus::Skipped,
                    Some(detail.to_owned()),
                );
            }
            state.unavailable.insert((*id).clone());
        }
    }

    /// The destination call for `id` in this phase, if any.
    fn op_for(&self, id: &Identity, deleting: bool) -> Option<Op> {
        let resolution = self.resolutions.get(id)?;
        if deleting {
            return match resolution {
                Resolution::Overwrite => Some(Op::Delete(id.clone())),
                _ => None,
            };
        }
        let item = self.items.get(id)?.clone();
        match resolution {
            Resolution::Overwrite if self.plan.in_place_updates => Some(Op::Update(item)),
            Resolution::Create | Resolution::Overwrite | Resolution::Rename { .. } => {
                Some(Op::Create(item))
            }
            Resolution::Skip => None,
        }
    }

    fn success_status(&self, id: &Identity) -> PushStatus {
        match self.resolutions.get(id) {
            Some(Resolution::Overwrite) => PushStatus::Updated,
            Some(Resolution::Rename { .. }) => PushStatus::Renamed,
            _ => PushStatus::Created,
        }
    }

    fn dispatch(
        &self,
        identity: Identity,
        op: Op,
        semaphore: &Arc<Semaphore>,
        tx: &mpsc::Sender<(Identity, Result<(), CoreError>)>,
    ) {
        let destination = Arc::clone(&self.destination);
        let semaphore = Arc::clone(semaphore);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            destination.ready().await;
            debug!(item = %identity, "dispatching destination call");
            let outcome = match &op {
                Op::Delete(id) => destination.delete(id).await,
                Op::Create(item) => destination.create(item).await,
                Op::Update(item) => destination.update(item).await,
            };
            let _ = tx.send((identity, outcome)).await;
        });
    }

    fn fail_item(&self, state: &mut AttemptState, id: &Identity, deleting: bool, err: &CoreError) {
        if deleting {
            // The recreate cannot proceed; settle the item now.
            state.unavailable.insert(id.clone());
            self.settle(
                state,
                id.clone(),
                PushStatus::Failed,
                Some(format!("delete before recreate failed: {err}")),
            );
        } else {
            self.settle(state, id.clone(), PushStatus::Failed, Some(err.to_string()));
        }
    }

    /// Settle every transitive in-phase dependent of a failed item as
    /// skipped-due-to-dependency-failure, without issuing calls.
    /// Propagation never leaves the phase member set.
    ///
    /// In the delete phase a failed delete leaves its object on the
    /// tenant, still holding references; deleting what it points at
    /// would be rejected, so those deletes are withheld rather than
    /// attempted. Deletes outside the failed item's chain proceed.
    fn propagate_failure<'a>(
        &'a self,
        state: &mut AttemptState,
        failed: &'a Identity,
        deleting: bool,
        members: &HashSet<&'a Identity>,
        settled: &mut HashSet<&'a Identity>,
    ) {
        let mut frontier: VecDeque<&'a Identity> = VecDeque::from([failed]);
        let mut seen: HashSet<&'a Identity> = HashSet::from([failed]);

        while let Some(current) = frontier.pop_front() {
            let edges = if deleting {
                self.requires.get(current)
            } else {
                self.required_by.get(current)
            };
            for dependent in edges.into_iter().flatten() {
                if !members.contains(dependent) || !seen.insert(dependent) {
                    continue;
                }
                frontier.push_back(dependent);
                if settled.contains(dependent) {
                    continue;
                }
                settled.insert(dependent);
                state.unavailable.insert(dependent.clone());
                self.settle(
                    state,
                    dependent.clone(),
                    PushStatus::SkippedDueToDependencyFailure,
                    Some(format!("dependency {failed} failed")),
                );
            }
        }
    }
}
