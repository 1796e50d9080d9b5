// Orchestrator behavior: ordering, failure propagation, cancellation.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{gid, prepare, status_of, vpn_snapshot, RecordingDestination};
use pretty_assertions::assert_eq;
use sasesync_core::plan::{plan, PlanOptions};
use sasesync_core::push::{self, NullProgress, PushOptions, PushPhase, PushStatus};
use sasesync_core::rewrite::{rewrite_items, RenameMap};
use sasesync_core::{
    ConfigItem, ConfigKind, ConflictPolicy, ConflictSet, DependencyGraph, Identity, Location,
    PushReport, RuleSet, Snapshot,
};
use serde_json::json;
use tokio::sync::Semaphore;

fn spawn_push(
    graph: &DependencyGraph,
    conflicts: &ConflictSet,
    plan_options: PlanOptions,
    destination: &Arc<RecordingDestination>,
    concurrency: usize,
) -> push::PushHandle {
    let push_plan = plan(graph, conflicts, plan_options).expect("valid plan");
    let renames = RenameMap::from_conflicts(conflicts, graph).expect("valid renames");
    let items = rewrite_items(graph, &renames, &RuleSet::builtin());
    push::start(
        graph,
        &push_plan,
        conflicts,
        items,
        Arc::clone(destination),
        Arc::new(NullProgress),
        PushOptions { concurrency },
    )
    .expect("push starts")
}

async fn run_push(
    graph: &DependencyGraph,
    conflicts: &ConflictSet,
    plan_options: PlanOptions,
    destination: &Arc<RecordingDestination>,
    concurrency: usize,
) -> PushReport {
    spawn_push(graph, conflicts, plan_options, destination, concurrency)
        .wait()
        .await
        .expect("push completes")
}

fn index_of(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|line| line == entry)
        .unwrap_or_else(|| panic!("'{entry}' not found in {log:?}"))
}

#[tokio::test]
async fn fresh_chain_respects_dependency_order() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;
    let destination = Arc::new(RecordingDestination::default());

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert!(report.is_clean());
    assert_eq!(report.succeeded(), 5);

    let log = destination.log();
    assert!(index_of(&log, "create GW-AWS") > index_of(&log, "create IKE-Strong"));
    assert!(index_of(&log, "create T-AWS") > index_of(&log, "create GW-AWS"));
    assert!(index_of(&log, "create T-AWS") > index_of(&log, "create IPSEC-Strong"));
    assert!(index_of(&log, "create SC-AWS") > index_of(&log, "create T-AWS"));
}

#[tokio::test]
async fn dependency_failure_skips_dependents_without_calls() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;
    let destination = Arc::new(RecordingDestination {
        fail_create: HashSet::from(["GW-AWS".to_owned()]),
        ..RecordingDestination::default()
    });

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeGateway, "GW-AWS")),
        PushStatus::Failed
    );
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IpsecTunnel, "T-AWS")),
        PushStatus::SkippedDueToDependencyFailure
    );
    assert_eq!(
        status_of(&report, &gid(ConfigKind::ServiceConnection, "SC-AWS")),
        PushStatus::SkippedDueToDependencyFailure
    );
    // Siblings of the failure still land.
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IpsecCryptoProfile, "IPSEC-Strong")),
        PushStatus::Created
    );

    let log = destination.log();
    assert!(!log.contains(&"create T-AWS".to_owned()));
    assert!(!log.contains(&"create SC-AWS".to_owned()));
    assert!(!report.is_clean());
}

#[tokio::test]
async fn overwrite_deletes_before_recreating() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[gid(ConfigKind::IpsecTunnel, "T-AWS")],
        &ConflictPolicy::Overwrite,
    )
    .await;
    let destination = Arc::new(RecordingDestination::default());

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert_eq!(
        status_of(&report, &gid(ConfigKind::IpsecTunnel, "T-AWS")),
        PushStatus::Updated
    );
    let log = destination.log();
    assert!(index_of(&log, "delete T-AWS") < index_of(&log, "create T-AWS"));
}

#[tokio::test]
async fn delete_failure_blocks_the_recreate_and_its_dependents() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[gid(ConfigKind::IpsecTunnel, "T-AWS")],
        &ConflictPolicy::Overwrite,
    )
    .await;
    let destination = Arc::new(RecordingDestination {
        fail_delete: HashSet::from(["T-AWS".to_owned()]),
        ..RecordingDestination::default()
    });

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert_eq!(
        status_of(&report, &gid(ConfigKind::IpsecTunnel, "T-AWS")),
        PushStatus::Failed
    );
    assert_eq!(
        status_of(&report, &gid(ConfigKind::ServiceConnection, "SC-AWS")),
        PushStatus::SkippedDueToDependencyFailure
    );
    // The chain below the failed overwrite still lands.
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeGateway, "GW-AWS")),
        PushStatus::Created
    );
    assert!(!destination.log().contains(&"create T-AWS".to_owned()));
}

#[tokio::test]
async fn unrelated_deletes_proceed_when_one_delete_fails() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[
            gid(ConfigKind::IpsecTunnel, "T-AWS"),
            gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"),
        ],
        &ConflictPolicy::Overwrite,
    )
    .await;
    let destination = Arc::new(RecordingDestination {
        fail_delete: HashSet::from(["T-AWS".to_owned()]),
        ..RecordingDestination::default()
    });

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    // The failed delete takes down its own chain only.
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IpsecTunnel, "T-AWS")),
        PushStatus::Failed
    );
    assert_eq!(
        status_of(&report, &gid(ConfigKind::ServiceConnection, "SC-AWS")),
        PushStatus::SkippedDueToDependencyFailure
    );

    // The other overwrite still deletes and recreates.
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeCryptoProfile, "IKE-Strong")),
        PushStatus::Updated
    );
    let log = destination.log();
    assert!(log.contains(&"delete IKE-Strong".to_owned()));
    assert!(index_of(&log, "delete IKE-Strong") < index_of(&log, "create IKE-Strong"));
    assert!(!log.contains(&"create T-AWS".to_owned()));
}

#[tokio::test]
async fn in_place_mode_updates_instead_of_deleting() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[gid(ConfigKind::IkeGateway, "GW-AWS")],
        &ConflictPolicy::Overwrite,
    )
    .await;
    let destination = Arc::new(RecordingDestination::default());

    let report = run_push(
        &graph,
        &conflicts,
        PlanOptions {
            in_place_updates: true,
        },
        &destination,
        1,
    )
    .await;

    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeGateway, "GW-AWS")),
        PushStatus::Updated
    );
    let log = destination.log();
    assert!(log.contains(&"update GW-AWS".to_owned()));
    assert!(!log.iter().any(|line| line.starts_with("delete")));
}

#[tokio::test]
async fn rename_pushes_under_the_new_name_with_rewritten_references() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[gid(ConfigKind::IkeCryptoProfile, "IKE-Strong")],
        &ConflictPolicy::Rename {
            suffix: "-dr".to_owned(),
        },
    )
    .await;
    let destination = Arc::new(RecordingDestination::default());

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeCryptoProfile, "IKE-Strong")),
        PushStatus::Renamed
    );
    assert!(destination.created_item("IKE-Strong-dr").is_some());
    assert!(destination.created_item("IKE-Strong").is_none());

    let gateway = destination
        .created_item("GW-AWS")
        .expect("gateway created");
    assert_eq!(
        gateway.fields["protocol"]["ikev2"]["ikeCryptoProfile"],
        "IKE-Strong-dr"
    );
}

#[tokio::test]
async fn cancellation_skips_everything_not_yet_attempted() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;

    let hold = Arc::new(Semaphore::new(0));
    let entered = Arc::new(Semaphore::new(0));
    let destination = Arc::new(RecordingDestination {
        hold: Some(Arc::clone(&hold)),
        entered: Some(Arc::clone(&entered)),
        ..RecordingDestination::default()
    });

    let handle = spawn_push(&graph, &conflicts, PlanOptions::default(), &destination, 1);

    // Wait for the first call to start, then cancel and release it.
    entered
        .acquire()
        .await
        .expect("first call entered")
        .forget();
    handle.cancel();
    hold.add_permits(16);

    let report = handle.wait().await.expect("push settles after cancel");

    assert!(report.cancelled);
    for name in ["GW-AWS", "T-AWS", "SC-AWS"] {
        let identity = Identity::global(identity_kind(name), name);
        assert_eq!(status_of(&report, &identity), PushStatus::Skipped);
    }
    assert!(!destination.log().contains(&"create GW-AWS".to_owned()));
}

#[tokio::test]
async fn auth_failure_stops_dispatch_early() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;
    let destination = Arc::new(RecordingDestination {
        auth_fail_create: HashSet::from(["IKE-Strong".to_owned()]),
        ..RecordingDestination::default()
    });

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 1).await;

    assert!(report.aborted.is_some());
    assert!(!report.cancelled);
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeCryptoProfile, "IKE-Strong")),
        PushStatus::Failed
    );
    assert_eq!(
        status_of(&report, &gid(ConfigKind::IkeGateway, "GW-AWS")),
        PushStatus::Skipped
    );
    assert!(!destination.log().contains(&"create GW-AWS".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn concurrency_stays_within_the_configured_bound() {
    let items: Vec<ConfigItem> = (0..6)
        .map(|i| {
            ConfigItem::new(
                ConfigKind::Address,
                format!("host-{i}"),
                Location::container("Branch-A"),
                json!({ "ipNetmask": format!("10.0.0.{i}/32") }),
            )
        })
        .collect();
    let selection: Vec<Identity> = items.iter().map(ConfigItem::identity).collect();
    let snapshot = Snapshot::from_items(items).expect("unique fixture");
    let (graph, conflicts) = prepare(&snapshot, &selection, &[], &ConflictPolicy::Skip).await;

    let destination = Arc::new(RecordingDestination {
        delay: Some(Duration::from_millis(50)),
        ..RecordingDestination::default()
    });

    let report = run_push(&graph, &conflicts, PlanOptions::default(), &destination, 2).await;

    assert_eq!(report.succeeded(), 6);
    assert!(destination.max_concurrent() <= 2);
}

#[tokio::test]
async fn phase_is_observable_through_the_handle() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;
    let destination = Arc::new(RecordingDestination::default());

    let handle = spawn_push(&graph, &conflicts, PlanOptions::default(), &destination, 1);
    let mut phases = handle.subscribe_phase();
    let report = handle.wait().await.expect("push completes");

    assert!(report.is_clean());
    assert_eq!(*phases.borrow_and_update(), PushPhase::Done);
}

fn identity_kind(name: &str) -> ConfigKind {
    match name {
        "GW-AWS" => ConfigKind::IkeGateway,
        "T-AWS" => ConfigKind::IpsecTunnel,
        "SC-AWS" => ConfigKind::ServiceConnection,
        other => panic!("unknown fixture item {other}"),
    }
}
