use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;

use librelink::{
    snapshot::{NodeSnapshot, NodeTree},
    AssetHandle, AssetStore, Facet, MemoryAssets, SyncError, SyncOutcome, SyncReport,
    SyncSettings,
};

use crate::relink_test::tree_util::{
    capture, link_to, memory_controller, mesh, stored, stored_link, tree_from,
};

fn synced(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Synced(report) => report,
        other => panic!("expected a sync, got {:?}", other),
    }
}

fn replica_of(history: &NodeSnapshot, local: &NodeSnapshot) -> NodeTree {
    let mut tree = tree_from("Replica", local);
    link_to(&mut tree, "car", &history.to_text());
    tree
}

#[test]
fn first_sync_of_a_bare_replica() {
    let external = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut replica = NodeTree::new("Replica");
    link_to(&mut replica, "car", "");

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &external))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    let report = synced(controller.sync(&handle).unwrap());
    assert!(report.changed());
    assert_eq!(stored(&controller, "replica"), external);
    assert_eq!(stored_link(&controller, "replica").last_synced_snapshot, external.to_text());

    let before = controller.store().get(&handle).unwrap().to_model();

    let report = synced(controller.sync(&handle).unwrap());
    assert!(!report.changed());
    assert_eq!(controller.store().get(&handle).unwrap().to_model(), before);
}

#[test]
fn moving_a_sibling_under_another_terminates() {
    let old = NodeSnapshot::new()
        .with_child("X", NodeSnapshot::new())
        .with_child("Y", NodeSnapshot::new());
    let new = NodeSnapshot::new().with_child("X", NodeSnapshot::new().with_child("Y", NodeSnapshot::new()));

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &old))],
        SyncSettings::default(),
    );

    controller.sync(&AssetHandle::new("replica")).unwrap();

    let result = stored(&controller, "replica");
    assert_eq!(result.child_names().collect::<Vec<_>>(), vec!["X"]);
    assert_eq!(result, new);
}

#[test]
fn upstream_move_wins_over_a_local_inversion() {
    let old = NodeSnapshot::new()
        .with_child("P", NodeSnapshot::new())
        .with_child("Y", NodeSnapshot::new());
    let new = NodeSnapshot::new().with_child("P", NodeSnapshot::new().with_child("Y", NodeSnapshot::new()));
    let local = NodeSnapshot::new().with_child("Y", NodeSnapshot::new().with_child("P", NodeSnapshot::new()));

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &local))],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    let report = synced(controller.sync(&handle).unwrap());
    assert!(report.changed());
    assert_eq!(stored(&controller, "replica"), new);
    assert_eq!(stored_link(&controller, "replica").last_synced_snapshot, new.to_text());

    let report = synced(controller.sync(&handle).unwrap());
    assert!(!report.changed());
}

#[test]
fn only_the_changed_instance_of_a_repeated_facet_is_updated() {
    let wheel = |second: &str| {
        NodeSnapshot::new()
            .with_facet("Collider", "v1")
            .with_facet("Collider", second)
    };
    let old = NodeSnapshot::new().with_child("Wheel", wheel("v2"));
    let new = NodeSnapshot::new().with_child("Wheel", wheel("v3"));

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &old))],
        SyncSettings::default(),
    );

    let report = synced(controller.sync(&AssetHandle::new("replica")).unwrap());

    assert_eq!(report.patch_set.updated_facets.len(), 1);
    assert_eq!(report.patch_set.updated_facets[0].index, 1);
    assert_eq!(stored(&controller, "replica"), new);
}

#[test]
fn create_and_destroy_follow_upstream() {
    let with_a = NodeSnapshot::new().with_child("A", NodeSnapshot::new());

    let mut controller = memory_controller(
        vec![("car", NodeTree::new("Car"))],
        vec![("replica", replica_of(&with_a, &with_a))],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");

    let report = synced(controller.sync(&handle).unwrap());
    assert!(report.patch_set.destroyed_nodes.contains("A"));
    assert_eq!(stored(&controller, "replica"), NodeSnapshot::new());

    *controller.provider_mut().get_mut(&AssetHandle::new("car")).unwrap() = tree_from("Car", &with_a);

    let report = synced(controller.sync(&handle).unwrap());
    assert!(report.patch_set.created_nodes.contains("A"));
    assert_eq!(report.patch_set.reparented_nodes.get("A").map(String::as_str), Some(""));
    assert_eq!(stored(&controller, "replica"), with_a);
}

#[test]
fn local_only_nodes_and_facets_survive() {
    let old = NodeSnapshot::new().with_child("Wheel", mesh("m1"));
    let new = NodeSnapshot::new()
        .with_child("Wheel", mesh("m2"))
        .with_child("Axle", NodeSnapshot::new());
    let local = NodeSnapshot::new()
        .with_child("Wheel", mesh("m1").with_facet("Decal", "flames"))
        .with_child("Spoiler", mesh("carbon"));

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &local))],
        SyncSettings::default(),
    );

    controller.sync(&AssetHandle::new("replica")).unwrap();

    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new()
            .with_child("Axle", NodeSnapshot::new())
            .with_child("Spoiler", mesh("carbon"))
            .with_child("Wheel", mesh("m2").with_facet("Decal", "flames"))
    );
}

#[test]
fn root_placement_is_never_synced() {
    let mut external = NodeTree::new("Car");
    let root = external.root_id();
    external
        .get_node_mut(root)
        .unwrap()
        .facets
        .push(Facet::new("Placement", "there"));

    let mut replica = NodeTree::new("Replica");
    let replica_root = replica.root_id();
    replica
        .get_node_mut(replica_root)
        .unwrap()
        .facets
        .push(Facet::new("Placement", "here"));
    link_to(&mut replica, "car", "");

    let mut controller = memory_controller(
        vec![("car", external)],
        vec![("replica", replica)],
        SyncSettings::default(),
    );

    controller.sync(&AssetHandle::new("replica")).unwrap();

    let stored = controller.store().get(&AssetHandle::new("replica")).unwrap();
    let placements: Vec<_> = stored
        .get_node(stored.root_id())
        .unwrap()
        .facets_of_type("Placement")
        .map(|facet| facet.state.as_str())
        .collect();
    assert_eq!(placements, vec!["here"]);
}

#[test]
fn name_override_turns_a_rename_into_an_update() {
    let old = NodeSnapshot::new().with_child("Wheel", mesh("m1"));
    let new = NodeSnapshot::new().with_child("Tyre", mesh("m2"));
    let local = NodeSnapshot::new().with_child("Wheel", mesh("m1").with_facet("Decal", "flames"));

    let mut replica = replica_of(&old, &local);
    let root = replica.root_id();
    let (_, mut link) = librelink::PersistentLink::locate(&replica, "SyncLink").unwrap();
    link.add_override("Tyre", "Wheel");
    link.write_to(&mut replica, root, "SyncLink").unwrap();

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );

    let report = synced(controller.sync(&AssetHandle::new("replica")).unwrap());

    assert!(report.patch_set.created_nodes.is_empty());
    assert!(report.patch_set.destroyed_nodes.is_empty());
    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child("Tyre", mesh("m2").with_facet("Decal", "flames"))
    );
    assert!(stored_link(&controller, "replica").name_overrides.is_empty());
}

#[test]
fn rename_without_override_replaces_the_node() {
    let old = NodeSnapshot::new().with_child("Wheel", mesh("m1"));
    let new = NodeSnapshot::new().with_child("Tyre", mesh("m2"));
    let local = NodeSnapshot::new().with_child("Wheel", mesh("m1").with_facet("Decal", "flames"));

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &local))],
        SyncSettings::default(),
    );

    controller.sync(&AssetHandle::new("replica")).unwrap();

    assert_eq!(stored(&controller, "replica"), new);
}

#[test]
fn json_facets_merge_into_local_state() {
    let old = NodeSnapshot::new().with_child(
        "Lamp",
        NodeSnapshot::new().with_facet("Light", r#"{"range":2}"#),
    );
    let new = NodeSnapshot::new().with_child(
        "Lamp",
        NodeSnapshot::new().with_facet("Light", r#"{"range":4}"#),
    );
    let local = NodeSnapshot::new().with_child(
        "Lamp",
        NodeSnapshot::new().with_facet("Light", r#"{"range":2,"tint":"blue"}"#),
    );

    let settings = SyncSettings {
        json_facets: vec!["Light".to_owned()],
        ..Default::default()
    };

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica_of(&old, &local))],
        settings,
    );

    controller.sync(&AssetHandle::new("replica")).unwrap();

    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child(
            "Lamp",
            NodeSnapshot::new().with_facet("Light", r#"{"range":4,"tint":"blue"}"#),
        )
    );
}

#[test]
fn observers_run_before_commit() {
    let new = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut replica = NodeTree::new("Replica");
    link_to(&mut replica, "car", "");

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &new))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );

    let calls = Rc::new(RefCell::new(Vec::new()));
    let observed = Rc::clone(&calls);
    controller.on_sync_applied(move |applied| {
        observed.borrow_mut().push(applied.touched.len());

        for &id in applied.touched {
            if let Some(node) = applied.tree.get_node_mut(id) {
                node.facets.push(Facet::new("Tag", "synced"));
            }
        }
    });

    controller.sync(&AssetHandle::new("replica")).unwrap();
    controller.sync(&AssetHandle::new("replica")).unwrap();

    assert_eq!(*calls.borrow(), vec![1, 0]);
    assert_eq!(
        stored(&controller, "replica"),
        NodeSnapshot::new().with_child("Wheel", mesh("m1").with_facet("Tag", "synced"))
    );
}

#[test]
fn failed_cycle_commits_nothing() {
    let old = NodeSnapshot::new().with_child("Wheel", mesh("m1"));

    let mut replica = tree_from("Replica", &old);
    link_to(&mut replica, "car", r#"{"-Wheel":{"Mesh":"m1"}"#);

    let mut controller = memory_controller(
        vec![("car", tree_from("Car", &NodeSnapshot::new()))],
        vec![("replica", replica)],
        SyncSettings::default(),
    );
    let handle = AssetHandle::new("replica");
    let before = controller.store().get(&handle).unwrap().to_model();

    let err = controller.sync(&handle).unwrap_err();

    assert!(matches!(err, SyncError::Format(_)));
    assert_eq!(controller.store().get(&handle).unwrap().to_model(), before);
}

#[test]
fn missing_external_asset_commits_nothing() {
    let mut replica = NodeTree::new("Replica");
    link_to(&mut replica, "gone", "");

    let mut controller = memory_controller(vec![], vec![("replica", replica)], SyncSettings::default());
    let handle = AssetHandle::new("replica");
    let before = controller.store().get(&handle).unwrap().to_model();

    assert!(matches!(controller.sync(&handle), Err(SyncError::Store(_))));
    assert_eq!(controller.store().get(&handle).unwrap().to_model(), before);
}

#[test]
fn duplicate_names_fail_loudly() {
    let mut external = NodeTree::new("Car");
    let root = external.root_id();
    let a = external.insert_node("A", Some(root)).unwrap();
    let b = external.insert_node("B", Some(root)).unwrap();
    external.insert_node("Bolt", Some(a)).unwrap();
    external.insert_node("Bolt", Some(b)).unwrap();

    let mut replica = NodeTree::new("Replica");
    link_to(&mut replica, "car", "");

    let mut controller = memory_controller(
        vec![("car", external)],
        vec![("replica", replica)],
        SyncSettings::default(),
    );

    assert!(matches!(
        controller.sync(&AssetHandle::new("replica")),
        Err(SyncError::Snapshot(_))
    ));
}

#[test]
fn memory_store_round_trip_of_captured_snapshot() {
    let snapshot = NodeSnapshot::new()
        .with_child("Wheel", mesh("m1").with_facet("Collider", "a").with_facet("Collider", "b"))
        .with_child("Body", NodeSnapshot::new().with_child("Door", mesh(r#"say "hi" \o/"#)));

    let mut store = MemoryAssets::new();
    store.insert("car", tree_from("Car", &snapshot));

    let tree = store.instantiate(&AssetHandle::new("car")).unwrap();
    let captured = capture(&tree);

    assert_eq!(NodeSnapshot::from_text(&captured.to_text()).unwrap(), captured);
    assert_eq!(captured, snapshot);
}
