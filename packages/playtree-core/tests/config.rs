#![cfg(feature = "serde")]

use std::io::Write;

use playtree_core::{load_config, EngineConfig};

#[test]
fn loads_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "rebalance_on_remove: false").unwrap();
    writeln!(file, "max_playlist_items: 500").unwrap();

    let config = load_config(file.path());
    assert!(!config.rebalance_on_remove);
    assert!(config.lock_playlists);
    assert_eq!(config.max_playlist_items, Some(500));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir.path().join("absent.yaml"));
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn unparsable_file_falls_back_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "lock_playlists: [not, a, bool]").unwrap();
    assert_eq!(load_config(file.path()), EngineConfig::default());
}
