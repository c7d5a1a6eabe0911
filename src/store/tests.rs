//! Tests for the filesystem store.

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

use super::*;

struct StoreFixture {
    _tmp: TempDir,
    root: Utf8PathBuf,
    store: Store,
}

#[fixture]
fn store_fixture() -> StoreFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().join("machine"))
        .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
    let store = Store::new(root.clone());
    StoreFixture {
        _tmp: tmp,
        root,
        store,
    }
}

fn none_host(name: &str) -> Host {
    Host::new(
        name,
        "none",
        json!({"MachineName": name, "URL": "unix:///var/run/docker.sock"}),
    )
}

fn seed(store: &Store, names: &[&str]) {
    for name in names {
        store
            .create(&none_host(name))
            .unwrap_or_else(|err| panic!("create {name}: {err}"));
    }
}

#[rstest]
#[case("test")]
#[case("web-01")]
#[case("db.internal")]
fn create_then_load_keeps_name_and_driver(store_fixture: StoreFixture, #[case] name: &str) {
    let StoreFixture { store, .. } = store_fixture;
    store
        .create(&none_host(name))
        .unwrap_or_else(|err| panic!("create: {err}"));

    let loaded = store.load(name).unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(loaded.name, name);
    assert_eq!(loaded.driver_name, "none");
    assert_eq!(loaded.driver["URL"], "unix:///var/run/docker.sock");
}

#[rstest]
fn create_writes_config_json(store_fixture: StoreFixture) {
    let StoreFixture { root, store, .. } = store_fixture;
    seed(&store, &["test"]);

    let raw = std::fs::read_to_string(root.join("test").join("config.json"))
        .unwrap_or_else(|err| panic!("read config: {err}"));
    let value: serde_json::Value =
        serde_json::from_str(&raw).unwrap_or_else(|err| panic!("parse config: {err}"));
    assert_eq!(value["Name"], "test");
    assert_eq!(value["DriverName"], "none");
}

#[rstest]
fn create_rejects_duplicates(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    seed(&store, &["test"]);

    let Err(err) = store.create(&none_host("test")) else {
        panic!("duplicate create should fail");
    };
    assert!(matches!(err, StoreError::AlreadyExists { ref name } if name == "test"));
}

#[rstest]
#[case("bad_name")]
#[case("")]
#[case("../outside")]
fn rejects_invalid_names(store_fixture: StoreFixture, #[case] name: &str) {
    let StoreFixture { store, .. } = store_fixture;

    let Err(err) = store.create(&none_host(name)) else {
        panic!("{name:?} should be rejected");
    };
    assert!(matches!(err, StoreError::InvalidName { .. }));
    assert!(err.to_string().starts_with("Invalid hostname specified"));
}

#[rstest]
fn remove_deletes_directory(store_fixture: StoreFixture) {
    let StoreFixture { root, store, .. } = store_fixture;
    seed(&store, &["test"]);

    store
        .remove("test")
        .unwrap_or_else(|err| panic!("remove: {err}"));

    assert!(!store.exists("test").unwrap_or_else(|err| panic!("exists: {err}")));
    assert!(!root.join("test").exists());
}

#[rstest]
fn remove_missing_host_is_not_found(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    assert!(matches!(
        store.remove("ghost"),
        Err(StoreError::NotFound { .. })
    ));
}

#[rstest]
fn load_missing_host_is_not_found(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    let Err(err) = store.load("ghost") else {
        panic!("missing host should not load");
    };
    assert_eq!(err.to_string(), "Host does not exist: \"ghost\"");
}

#[rstest]
fn set_then_get_active(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    seed(&store, &["one", "two"]);

    store
        .set_active("two")
        .unwrap_or_else(|err| panic!("set active: {err}"));

    let active = store
        .get_active()
        .unwrap_or_else(|err| panic!("get active: {err}"));
    assert_eq!(active.map(|host| host.name).as_deref(), Some("two"));
    assert!(store.is_active("two").unwrap_or_else(|err| panic!("is active: {err}")));
    assert!(!store.is_active("one").unwrap_or_else(|err| panic!("is active: {err}")));
}

#[rstest]
fn set_active_replaces_previous_marker(store_fixture: StoreFixture) {
    let StoreFixture { root, store, .. } = store_fixture;
    seed(&store, &["one", "two"]);

    store
        .set_active("one")
        .unwrap_or_else(|err| panic!("set one: {err}"));
    store
        .set_active("two")
        .unwrap_or_else(|err| panic!("set two: {err}"));

    let marker = std::fs::read_to_string(root.join(".active"))
        .unwrap_or_else(|err| panic!("read marker: {err}"));
    assert_eq!(marker, "two");
    assert!(!root.join(".active.tmp").exists());
}

#[rstest]
fn set_active_requires_existing_host(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    assert!(matches!(
        store.set_active("ghost"),
        Err(StoreError::NotFound { .. })
    ));
}

#[rstest]
fn remove_active_clears_marker(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    seed(&store, &["test"]);
    store
        .set_active("test")
        .unwrap_or_else(|err| panic!("set active: {err}"));

    store
        .remove_active()
        .unwrap_or_else(|err| panic!("remove active: {err}"));

    let active = store
        .get_active()
        .unwrap_or_else(|err| panic!("get active: {err}"));
    assert!(active.is_none());
    store
        .remove_active()
        .unwrap_or_else(|err| panic!("second remove should succeed: {err}"));
}

#[rstest]
fn get_active_without_marker_is_none(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    let active = store
        .get_active()
        .unwrap_or_else(|err| panic!("missing marker should not error: {err}"));
    assert!(active.is_none());
}

#[rstest]
fn get_active_ignores_marker_for_removed_host(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    seed(&store, &["test"]);
    store
        .set_active("test")
        .unwrap_or_else(|err| panic!("set active: {err}"));
    store
        .remove("test")
        .unwrap_or_else(|err| panic!("remove: {err}"));

    let active = store
        .get_active()
        .unwrap_or_else(|err| panic!("get active: {err}"));
    assert!(active.is_none());
}

#[rstest]
fn get_active_ignores_blank_marker(store_fixture: StoreFixture) {
    let StoreFixture { root, store, .. } = store_fixture;
    seed(&store, &["test"]);
    std::fs::write(root.join(".active"), "  \n").unwrap_or_else(|err| panic!("write: {err}"));

    let active = store
        .get_active()
        .unwrap_or_else(|err| panic!("get active: {err}"));
    assert!(active.is_none());
}

#[rstest]
fn list_is_sorted_and_skips_hidden_and_broken_entries(store_fixture: StoreFixture) {
    let StoreFixture { root, store, .. } = store_fixture;
    seed(&store, &["zeta", "alpha", "mid"]);
    store
        .set_active("mid")
        .unwrap_or_else(|err| panic!("set active: {err}"));
    std::fs::create_dir_all(root.join(".cache")).unwrap_or_else(|err| panic!("mkdir: {err}"));
    std::fs::create_dir_all(root.join("broken")).unwrap_or_else(|err| panic!("mkdir: {err}"));
    std::fs::write(root.join("broken").join("config.json"), "{not json")
        .unwrap_or_else(|err| panic!("write: {err}"));

    let names: Vec<String> = store
        .list()
        .unwrap_or_else(|err| panic!("list: {err}"))
        .into_iter()
        .map(|host| host.name)
        .collect();

    assert_eq!(names, ["alpha", "mid", "zeta"]);
}

#[rstest]
fn save_overwrites_driver_config(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    seed(&store, &["test"]);

    let mut host = store.load("test").unwrap_or_else(|err| panic!("load: {err}"));
    host.driver = json!({"URL": "tcp://192.0.2.1:2376"});
    store.save(&host).unwrap_or_else(|err| panic!("save: {err}"));

    let reloaded = store.load("test").unwrap_or_else(|err| panic!("reload: {err}"));
    assert_eq!(reloaded.driver["URL"], "tcp://192.0.2.1:2376");
}
