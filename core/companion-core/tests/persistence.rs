//! Integration tests for on-disk state under an isolated home directory.

use companion_core::{
    load_config_or_default, CompanionConfig, Launcher, StorageConfig, Tracker, WindowState, WINDOW_STATE_FILE,
};

#[test]
fn test_window_state_lives_in_home_and_round_trips() {
    let home = tempfile::tempdir().expect("temp dir");
    let storage = StorageConfig::with_home(home.path().to_path_buf());
    let path = storage.window_state_file();
    assert_eq!(path, home.path().join(WINDOW_STATE_FILE));

    assert_eq!(WindowState::load(&path), WindowState::default());

    let state = WindowState {
        width: 640,
        height: 480,
        x: Some(10),
        y: Some(20),
    };
    state.save(&path).expect("save");
    assert_eq!(WindowState::load(&path), state);

    std::fs::write(&path, "garbage").expect("write");
    assert_eq!(WindowState::load(&path), WindowState::default());
}

#[test]
fn test_zero_sized_window_state_falls_back() {
    let home = tempfile::tempdir().expect("temp dir");
    let path = StorageConfig::with_home(home.path().to_path_buf()).window_state_file();
    std::fs::write(&path, r#"{"width": 0, "height": 800, "x": 5, "y": 5}"#).expect("write");

    assert_eq!(WindowState::load(&path), WindowState::default());
}

#[test]
fn test_config_file_drives_tracker_delays() {
    let home = tempfile::tempdir().expect("temp dir");
    let storage = StorageConfig::with_home(home.path().to_path_buf());
    std::fs::create_dir_all(storage.root()).expect("create root");
    std::fs::write(
        storage.config_file(),
        "[tracker]\nsettle_delay_ms = 50\npolling = false\n\n[probe]\nprocess_name = \"assistant\"\n",
    )
    .expect("write config");

    let config = load_config_or_default(&storage.config_file());
    assert_eq!(config.tracker.settle_delay_ms, 50);
    assert!(!config.tracker.polling);
    assert_eq!(config.tracker.activity_revert_ms, 2_000);
    assert_eq!(config.probe.process_name.as_deref(), Some("assistant"));

    let tracker = Tracker::new(home.path(), config.tracker);
    assert!(!tracker.is_connected());
}

#[test]
fn test_malformed_config_uses_defaults() {
    let home = tempfile::tempdir().expect("temp dir");
    let storage = StorageConfig::with_home(home.path().to_path_buf());
    std::fs::create_dir_all(storage.root()).expect("create root");
    std::fs::write(storage.config_file(), "[tracker\nnot toml").expect("write config");

    let config = load_config_or_default(&storage.config_file());
    assert_eq!(config, CompanionConfig::default());
}

#[test]
fn test_launcher_reports_missing_directory() {
    let home = tempfile::tempdir().expect("temp dir");
    let missing = home.path().join("does-not-exist");

    let result = Launcher::new("/bin/true").launch_instance(&missing.to_string_lossy());
    assert!(!result.success);
    assert!(!result.message.is_empty());
}
