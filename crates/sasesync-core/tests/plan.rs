// Planner ordering, skip handling, and cycle fail-fast.

mod common;

use common::{build_graph, gid, prepare, vpn_snapshot};
use pretty_assertions::assert_eq;
use sasesync_core::plan::{PlanOptions, plan};
use sasesync_core::{
    ConfigItem, ConfigKind, ConflictPolicy, ConflictSet, CoreError, Identity, Location,
    Resolution, Snapshot,
};
use serde_json::json;

#[tokio::test]
async fn fresh_chain_creates_dependencies_first() {
    let snapshot = vpn_snapshot();
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &[],
        &ConflictPolicy::Skip,
    )
    .await;

    let push_plan = plan(&graph, &conflicts, PlanOptions::default()).expect("acyclic plan");

    assert_eq!(
        push_plan.create_order,
        vec![
            gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"),
            gid(ConfigKind::IpsecCryptoProfile, "IPSEC-Strong"),
            gid(ConfigKind::IkeGateway, "GW-AWS"),
            gid(ConfigKind::IpsecTunnel, "T-AWS"),
            gid(ConfigKind::ServiceConnection, "SC-AWS"),
        ]
    );
    assert!(push_plan.delete_order.is_empty());
}

#[tokio::test]
async fn delete_order_reverses_creates_for_overwrites_only() {
    let snapshot = vpn_snapshot();
    let existing = [
        gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"),
        gid(ConfigKind::IpsecTunnel, "T-AWS"),
    ];
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &existing,
        &ConflictPolicy::Overwrite,
    )
    .await;

    let push_plan = plan(&graph, &conflicts, PlanOptions::default()).expect("acyclic plan");

    assert_eq!(
        push_plan.delete_order,
        vec![
            gid(ConfigKind::IpsecTunnel, "T-AWS"),
            gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"),
        ]
    );
    assert_eq!(push_plan.create_order.len(), 5);
}

#[tokio::test]
async fn in_place_updates_leave_the_delete_order_empty() {
    let snapshot = vpn_snapshot();
    let existing = [gid(ConfigKind::IpsecTunnel, "T-AWS")];
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &existing,
        &ConflictPolicy::Overwrite,
    )
    .await;

    let push_plan = plan(
        &graph,
        &conflicts,
        PlanOptions {
            in_place_updates: true,
        },
    )
    .expect("acyclic plan");

    assert!(push_plan.delete_order.is_empty());
    assert!(push_plan.in_place_updates);
}

#[tokio::test]
async fn skipped_items_never_enter_the_orders() {
    let snapshot = vpn_snapshot();
    let existing = [
        gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"),
        gid(ConfigKind::IpsecCryptoProfile, "IPSEC-Strong"),
    ];
    let (graph, conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &existing,
        &ConflictPolicy::Skip,
    )
    .await;

    let push_plan = plan(&graph, &conflicts, PlanOptions::default()).expect("acyclic plan");

    assert_eq!(
        push_plan.create_order,
        vec![
            gid(ConfigKind::IkeGateway, "GW-AWS"),
            gid(ConfigKind::IpsecTunnel, "T-AWS"),
            gid(ConfigKind::ServiceConnection, "SC-AWS"),
        ]
    );
}

#[tokio::test]
async fn independent_items_come_out_in_stable_name_order() {
    let items: Vec<ConfigItem> = ["charlie", "alpha", "bravo"]
        .iter()
        .map(|name| {
            ConfigItem::new(
                ConfigKind::Address,
                *name,
                Location::container("Branch-A"),
                json!({ "ipNetmask": "10.0.0.1/32" }),
            )
        })
        .collect();
    let snapshot = Snapshot::from_items(items).expect("unique fixture");
    let selection: Vec<Identity> = ["charlie", "alpha", "bravo"]
        .iter()
        .map(|name| Identity::new(ConfigKind::Address, *name, Location::container("Branch-A")))
        .collect();
    let (graph, conflicts) = prepare(&snapshot, &selection, &[], &ConflictPolicy::Skip).await;

    let push_plan = plan(&graph, &conflicts, PlanOptions::default()).expect("acyclic plan");
    let names: Vec<&str> = push_plan
        .create_order
        .iter()
        .map(|id| id.name.as_str())
        .collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
}

#[tokio::test]
async fn cycle_among_pushed_items_fails_fast() {
    let (graph, conflicts) = cyclic_groups(&ConflictPolicy::Skip, &[]).await;
    let err = plan(&graph, &conflicts, PlanOptions::default())
        .expect_err("cyclic non-skip subgraph must fail");
    let CoreError::CycleDetected { members } = err else {
        panic!("expected CycleDetected, got {err}");
    };
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn skipping_one_member_breaks_the_cycle() {
    let skip_target = Identity::new(
        ConfigKind::AddressGroup,
        "g-b",
        Location::container("Branch-A"),
    );
    let (graph, conflicts) =
        cyclic_groups(&ConflictPolicy::Skip, std::slice::from_ref(&skip_target)).await;

    let push_plan = plan(&graph, &conflicts, PlanOptions::default())
        .expect("cycle broken by the skipped member");
    let names: Vec<&str> = push_plan
        .create_order
        .iter()
        .map(|id| id.name.as_str())
        .collect();
    assert_eq!(names, vec!["g-a"]);
}

#[tokio::test]
async fn every_node_needs_a_resolution() {
    let snapshot = vpn_snapshot();
    let graph = build_graph(&snapshot, &[gid(ConfigKind::ServiceConnection, "SC-AWS")]);
    let err = plan(&graph, &ConflictSet::default(), PlanOptions::default())
        .expect_err("empty conflict set must fail");
    assert!(matches!(err, CoreError::MissingResolution { .. }));
}

#[tokio::test]
async fn overridden_rename_survives_into_the_plan() {
    let snapshot = vpn_snapshot();
    let existing = [gid(ConfigKind::IkeCryptoProfile, "IKE-Strong")];
    let (graph, mut conflicts) = prepare(
        &snapshot,
        &[gid(ConfigKind::ServiceConnection, "SC-AWS")],
        &existing,
        &ConflictPolicy::Skip,
    )
    .await;

    conflicts
        .get_mut(&gid(ConfigKind::IkeCryptoProfile, "IKE-Strong"))
        .expect("record present")
        .set_resolution(Resolution::Rename {
            new_name: "IKE-Strong-dr".to_owned(),
        })
        .expect("valid rename");

    let push_plan = plan(&graph, &conflicts, PlanOptions::default()).expect("acyclic plan");
    // The renamed profile is pushed (under its new name), not skipped.
    assert_eq!(push_plan.create_order.len(), 5);
    assert!(push_plan.delete_order.is_empty());
}

/// Two mutually referencing address groups, detected against `existing`.
async fn cyclic_groups(
    policy: &ConflictPolicy,
    existing: &[Identity],
) -> (sasesync_core::DependencyGraph, ConflictSet) {
    let items = vec![
        ConfigItem::new(
            ConfigKind::AddressGroup,
            "g-a",
            Location::container("Branch-A"),
            json!({ "static": ["g-b"] }),
        ),
        ConfigItem::new(
            ConfigKind::AddressGroup,
            "g-b",
            Location::container("Branch-A"),
            json!({ "static": ["g-a"] }),
        ),
    ];
    let snapshot = Snapshot::from_items(items).expect("unique fixture");
    let selection = [Identity::new(
        ConfigKind::AddressGroup,
        "g-a",
        Location::container("Branch-A"),
    )];
    prepare(&snapshot, &selection, existing, policy).await
}
