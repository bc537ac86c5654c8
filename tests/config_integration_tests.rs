//! Integration tests for ConfigurationStore and HostSettings
//!
//! These tests verify:
//! - Store round trip through the YAML file
//! - Rejection of configurations without an id
//! - Hand-written store files
//! - Settings file layering

use axishud::config::{ConfigurationStore, HostSettings};
use axishud::models::{Axis, Configuration, ConfigurationError, HorizontalAnchor, VerticalAnchor};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn create_test_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

fn stored(id: i64) -> Configuration {
    let mut conf = Configuration::new();
    conf.set_id(id);
    conf
}

#[test]
fn test_store_round_trip() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("nested").join("configurations.yaml");

    let mut first = stored(10);
    first.set_initial_axis(Axis::Vertical);
    first.set_restart_from_last_position(true);
    first.set_bar_width(12);
    first.set_horizontal_speed(3);
    first.set_vertical_speed(7);
    first.set_horizontal_start_anchor(HorizontalAnchor::Bottom);
    first.set_vertical_start_anchor(VerticalAnchor::Right);

    let mut store = ConfigurationStore::open(&path).unwrap();
    assert_ok!(store.add(first.clone()));
    assert_ok!(store.add(stored(20)));
    assert_ok!(store.save());

    let reopened = ConfigurationStore::open(&path).unwrap();
    assert_eq!(reopened.all_ids(), vec![10, 20]);
    assert_eq!(reopened.find_by_id(10), Some(&first));
    assert!(reopened.find_by_id(30).is_none());
}

#[test]
fn test_unassigned_id_never_reaches_disk() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("configurations.yaml");

    let mut store = ConfigurationStore::open(&path).unwrap();
    let result = store.add(Configuration::new());

    assert_eq!(result, Err(ConfigurationError::UnassignedIdentity(-1)));

    store.save().unwrap();
    let reopened = ConfigurationStore::open(&path).unwrap();
    assert!(reopened.is_empty());
}

#[test]
fn test_hand_written_store_file() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("configurations.yaml");
    fs::write(
        &path,
        "configurations:\n  - id: 1\n    initial_axis: vertical\n  - id: -1\n  \
         - id: 2\n    bar_width: 30\n",
    )
    .unwrap();

    let store = ConfigurationStore::open(&path).unwrap();

    // The entry without id is skipped, missing fields take defaults.
    assert_eq!(store.all_ids(), vec![1, 2]);
    assert_eq!(store.find_by_id(1).map(|c| c.initial_axis()), Some(Axis::Vertical));
    assert_eq!(store.find_by_id(1).map(|c| c.bar_width()), Some(24));
    assert_eq!(store.find_by_id(2).map(|c| c.bar_width()), Some(30));
}

#[test]
fn test_corrupt_store_file_is_an_error() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("configurations.yaml");
    fs::write(&path, "configurations: [this is: not: valid").unwrap();

    let err = ConfigurationStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse configuration store"));
}

#[test]
fn test_removals_persist() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("configurations.yaml");

    let mut store = ConfigurationStore::open(&path).unwrap();
    for id in 1..=3 {
        store.add(stored(id)).unwrap();
    }
    assert!(store.remove(&stored(1)));
    assert!(store.remove_id(3).is_some());
    store.save().unwrap();

    let reopened = ConfigurationStore::open(&path).unwrap();
    assert_eq!(reopened.all_ids(), vec![2]);
}

#[test]
fn test_settings_file() {
    let (_temp_dir, dir) = create_test_dir();
    let path = dir.join("axishud.yaml");
    fs::write(
        &path,
        "frame_interval_ms: 33\nstore_path: /tmp/store.yaml\nindicator_color: \"#ff8800\"\n",
    )
    .unwrap();

    let settings = HostSettings::load_with_env(Some(&path), Some(Default::default())).unwrap();

    assert_eq!(settings.frame_interval_ms, 33);
    assert_eq!(settings.store_path, "/tmp/store.yaml");
    assert_eq!(settings.indicator_color().unwrap().to_string(), "#ff8800");
    assert_eq!(settings.display_width, 1080);
}
