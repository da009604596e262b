//! Settings loading from a TOML file on disk.

use std::fs;

use treewatch::config::{EventKind, Settings};
use treewatch::watcher::WatchMask;

#[test]
fn test_load_from_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("treewatch.toml");
    fs::write(
        &config_path,
        r#"
root = "/srv/shared"
events = ["create", "delete", "close_write"]

[logging]
default = "debug"

[logging.modules]
treewatch = "trace"
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&config_path)).unwrap();

    assert_eq!(settings.root, std::path::PathBuf::from("/srv/shared"));
    assert_eq!(
        settings.events,
        vec![EventKind::Create, EventKind::Delete, EventKind::CloseWrite]
    );
    assert_eq!(settings.logging.default, "debug");
    assert_eq!(
        settings.logging.modules.get("treewatch").map(String::as_str),
        Some("trace")
    );

    let mask = settings.watch_mask();
    assert!(mask.contains(WatchMask::CREATE | WatchMask::DELETE | WatchMask::CLOSE_WRITE));
    assert!(!mask.contains(WatchMask::MODIFY));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("does-not-exist.toml");

    let settings = Settings::load(Some(&config_path)).unwrap();

    assert_eq!(settings.version, 1);
    assert_eq!(settings.events, vec![EventKind::Create, EventKind::Delete]);
}

#[test]
fn test_partial_file_keeps_unset_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("treewatch.toml");
    fs::write(&config_path, "root = \"/data\"\n").unwrap();

    let settings = Settings::load(Some(&config_path)).unwrap();

    assert_eq!(settings.root, std::path::PathBuf::from("/data"));
    // events and logging stay at their defaults
    assert_eq!(settings.events, vec![EventKind::Create, EventKind::Delete]);
    assert_eq!(settings.logging.default, "info");
}
