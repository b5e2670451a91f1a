use pretty_assertions::assert_eq;

use librelink::{
    snapshot::{NodeSnapshot, NodeTree},
    AssetHandle, LinkStateError, SyncError, SyncOutcome, SyncSettings,
};

use crate::relink_test::tree_util::{link_to, memory_controller, mesh, stored, stored_link, tree_from};

fn car(value: &str) -> NodeTree {
    tree_from("Car", &NodeSnapshot::new().with_child("Wheel", mesh(value)))
}

#[test]
fn first_bind_records_a_baseline_only() {
    let local = NodeSnapshot::new().with_child("Wheel", mesh("painted"));

    let mut controller = memory_controller(
        vec![("car", car("m1"))],
        vec![("replica", tree_from("Replica", &local))],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    let outcome = controller.bind(&handle, Some(AssetHandle::new("car"))).unwrap();

    assert_eq!(outcome, SyncOutcome::Bound);
    assert_eq!(stored(&controller, "replica"), local);

    let link = stored_link(&controller, "replica");
    assert_eq!(link.external_ref, Some(AssetHandle::new("car")));
    assert_eq!(link.last_synced_snapshot, r#"{"-Wheel":{"Mesh":"m1"}}"#);

    // Only upstream changes made after binding are carried over.
    *controller.provider_mut().get_mut(&AssetHandle::new("car")).unwrap() = car("m2");
    controller.sync(&handle).unwrap();

    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child("Wheel", mesh("m2"))
    );
}

#[test]
fn unbind_keeps_history_and_rebind_resumes() {
    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut replica = tree_from("Replica", &history);
    link_to(&mut replica, "car", &history.to_text());

    let mut controller = memory_controller(
        vec![("car", car("m1"))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    assert_eq!(controller.bind(&handle, None).unwrap(), SyncOutcome::Unlinked);

    let link = stored_link(&controller, "replica");
    assert_eq!(link.external_ref, None);
    assert_eq!(link.last_synced_snapshot, history.to_text());

    *controller.provider_mut().get_mut(&AssetHandle::new("car")).unwrap() = car("m2");
    assert_eq!(controller.sync(&handle).unwrap(), SyncOutcome::Unlinked);
    assert_eq!(stored(&controller, "replica"), history);

    let outcome = controller.bind(&handle, Some(AssetHandle::new("car"))).unwrap();

    assert!(matches!(outcome, SyncOutcome::Synced(ref report) if report.changed()));
    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child("Wheel", mesh("m2"))
    );
}

#[test]
fn binding_to_the_same_asset_is_a_no_op() {
    let mut replica = NodeTree::new("Replica");
    link_to(&mut replica, "car", "{}");

    let mut controller = memory_controller(
        vec![("car", car("m1"))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    assert_eq!(
        controller.bind(&handle, Some(AssetHandle::new("car"))).unwrap(),
        SyncOutcome::Bound
    );
    assert_eq!(stored(&controller, "replica"), NodeSnapshot::new());
}

#[test]
fn unbinding_an_unlinked_replica_adds_nothing() {
    let mut controller = memory_controller(
        vec![],
        vec![("replica", NodeTree::new("Replica"))],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    assert_eq!(controller.bind(&handle, None).unwrap(), SyncOutcome::Unlinked);
    assert!(matches!(
        controller.sync(&handle),
        Err(SyncError::LinkState(LinkStateError::MissingLink { .. }))
    ));
}

#[test]
fn turning_auto_sync_back_on_syncs() {
    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut replica = tree_from("Replica", &history);
    link_to(&mut replica, "car", &history.to_text());

    let mut controller = memory_controller(
        vec![("car", car("m1"))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");
    let external = AssetHandle::new("car");

    assert_eq!(controller.set_auto_sync(&handle, false).unwrap(), None);
    assert!(!stored_link(&controller, "replica").auto_sync);

    *controller.provider_mut().get_mut(&external).unwrap() = car("m2");

    let results = controller.external_changed(&external).unwrap();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].1, Ok(SyncOutcome::PendingManual)));
    assert_eq!(stored(&controller, "replica"), history);

    let report = controller.set_auto_sync(&handle, true).unwrap().unwrap();

    assert!(report.changed());
    assert!(stored_link(&controller, "replica").auto_sync);
    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child("Wheel", mesh("m2"))
    );

    assert_eq!(controller.set_auto_sync(&handle, true).unwrap(), None);
}

#[test]
fn external_change_reaches_only_followers() {
    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut follower = tree_from("Follower", &history);
    link_to(&mut follower, "car", &history.to_text());

    let mut other = tree_from("Other", &history);
    link_to(&mut other, "truck", &history.to_text());

    let mut controller = memory_controller(
        vec![("car", car("m2")), ("truck", car("m3"))],
        vec![
            ("follower", follower),
            ("other", other),
            ("loose", NodeTree::new("Loose")),
        ],
        SyncSettings::default(),
    );

    let results = controller.external_changed(&AssetHandle::new("car")).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, AssetHandle::new("follower"));
    assert!(matches!(results[0].1, Ok(SyncOutcome::Synced(_))));

    assert_eq!(
        stored(&controller, "follower"),
        NodeSnapshot::new().with_child("Wheel", mesh("m2"))
    );
    assert_eq!(stored(&controller, "other"), history);
}

#[test]
fn global_switch_holds_every_follower() {
    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut follower = tree_from("Follower", &history);
    link_to(&mut follower, "car", &history.to_text());

    let settings = SyncSettings {
        auto_sync_enabled: false,
        ..Default::default()
    };

    let mut controller = memory_controller(
        vec![("car", car("m2"))],
        vec![("follower", follower)],
        settings,
    );

    let results = controller.external_changed(&AssetHandle::new("car")).unwrap();

    assert!(matches!(results[0].1, Ok(SyncOutcome::PendingManual)));
    assert_eq!(stored(&controller, "follower"), history);

    // A manual sync still goes through.
    controller.sync(&AssetHandle::new("follower")).unwrap();
    assert_eq!(
        stored(&controller, "follower"),
        NodeSnapshot::new().with_child("Wheel", mesh("m2"))
    );
}

#[test]
fn one_failing_follower_does_not_stop_the_rest() {
    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut broken = tree_from("Broken", &history);
    link_to(&mut broken, "car", "{");

    let mut healthy = tree_from("Healthy", &history);
    link_to(&mut healthy, "car", &history.to_text());

    let mut controller = memory_controller(
        vec![("car", car("m2"))],
        vec![("a-broken", broken), ("b-healthy", healthy)],
        SyncSettings::default(),
    );

    let results = controller.external_changed(&AssetHandle::new("car")).unwrap();

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].1, Err(SyncError::Format(_))));
    assert!(matches!(results[1].1, Ok(SyncOutcome::Synced(_))));
    assert_eq!(stored(&controller, "a-broken"), history);
}
