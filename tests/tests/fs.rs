use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use librelink::{
    cli::Options,
    snapshot::{NodeSnapshot, NodeTree},
    AssetHandle, AssetProvider, AssetStore, FsAssets, PersistentLink, SyncController,
    SyncOutcome, SyncSettings,
};

use crate::relink_test::tree_util::{capture, link_to, mesh, tree_from};

#[test]
fn sync_between_model_files() {
    let _ = env_logger::try_init();

    let dir = tempdir().unwrap();
    let mut assets = FsAssets::new(dir.path());

    let history = NodeSnapshot::new().with_child("Wheel", mesh("m1"));
    let external = NodeSnapshot::new()
        .with_child("Wheel", mesh("m2"))
        .with_child("Axle", NodeSnapshot::new());

    let mut replica = tree_from("Replica", &history);
    link_to(&mut replica, "car", &history.to_text());

    assets.commit(&AssetHandle::new("car"), tree_from("Car", &external)).unwrap();
    assets.commit(&AssetHandle::new("replica"), replica).unwrap();

    let mut controller = SyncController::new(assets.clone(), assets.clone(), SyncSettings::default());
    let outcome = controller.sync(&AssetHandle::new("replica")).unwrap();

    assert!(matches!(outcome, SyncOutcome::Synced(ref report) if report.changed()));

    let reloaded = assets.load(&AssetHandle::new("replica")).unwrap();
    assert_eq!(capture(&reloaded), external);

    let (_, link) = PersistentLink::locate(&reloaded, "SyncLink").unwrap();
    assert_eq!(link.last_synced_snapshot, external.to_text());
}

#[test]
fn settings_file_renames_the_link_facet() {
    let dir = tempdir().unwrap();
    fs_err::write(dir.path().join("relink.json"), r#"{ "linkFacet": "Origin" }"#).unwrap();

    let mut assets = FsAssets::new(dir.path());
    assets
        .commit(&AssetHandle::new("car"), tree_from("Car", &NodeSnapshot::new().with_child("Wheel", mesh("m1"))))
        .unwrap();
    assets
        .commit(&AssetHandle::new("replica"), NodeTree::new("Replica"))
        .unwrap();

    let settings = SyncSettings::load_fuzzy(dir.path()).unwrap();
    let mut controller = SyncController::new(assets.clone(), assets.clone(), settings);

    controller
        .bind(&AssetHandle::new("replica"), Some(AssetHandle::new("car")))
        .unwrap();

    let stored = assets.load(&AssetHandle::new("replica")).unwrap();
    let root = stored.get_node(stored.root_id()).unwrap();

    assert_eq!(root.facets_of_type("Origin").count(), 1);
    assert_eq!(root.facets_of_type("SyncLink").count(), 0);
}

#[test]
fn cli_bind_then_sync() {
    let dir = tempdir().unwrap();
    let mut assets = FsAssets::new(dir.path());
    let assets_arg = dir.path().to_str().unwrap();

    assets
        .commit(&AssetHandle::new("car"), tree_from("Car", &NodeSnapshot::new()))
        .unwrap();
    assets
        .commit(&AssetHandle::new("replica"), NodeTree::new("Replica"))
        .unwrap();

    Options::try_parse_from([
        "relink", "--assets", assets_arg, "bind", "replica", "--external", "car",
    ])
    .unwrap()
    .run()
    .unwrap();

    let upstream = NodeSnapshot::new().with_child("Wheel", mesh("m1"));
    assets
        .commit(&AssetHandle::new("car"), tree_from("Car", &upstream))
        .unwrap();

    Options::try_parse_from(["relink", "--assets", assets_arg, "sync", "replica"])
        .unwrap()
        .run()
        .unwrap();

    let reloaded = assets.instantiate(&AssetHandle::new("replica")).unwrap();
    assert_eq!(capture(&reloaded), upstream);

    assert!(Options::try_parse_from(["relink", "--assets", assets_arg, "sync", "ghost"])
        .unwrap()
        .run()
        .is_err());
}
