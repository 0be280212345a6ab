use rhythm_playback::{PlaybackClock, PlaybackConfig, PlaybackError, Scheduling};
use std::fs;
use tempfile::tempdir;

fn sample_config() -> PlaybackConfig {
    PlaybackConfig {
        tick_length_ms: 5.0,
        initial_leadup_ms: 2000.0,
        playback_speed: 0.75,
        forgiveness_ms: 300.0,
        scheduling: Scheduling::Manual,
    }
}

#[test]
fn test_save_and_load_ron() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.ron");

    let config = sample_config();
    config.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("tick_length_ms"));
    assert!(!text.trim_start().starts_with('{'));

    assert_eq!(PlaybackConfig::load(&path).unwrap(), config);
}

#[test]
fn test_save_and_load_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.JSON");

    let config = sample_config();
    config.save(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["playback_speed"], 0.75);

    assert_eq!(PlaybackConfig::load(&path).unwrap(), config);
}

#[test]
fn test_loaded_config_builds_clock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.ron");
    fs::write(&path, "(tick_length_ms: 10.0, initial_leadup_ms: 40.0, scheduling: Manual)")
        .unwrap();

    let config = PlaybackConfig::load(&path).unwrap();
    let clock = PlaybackClock::from_config(&config).unwrap();
    assert_eq!(clock.current_tick(), -4.0);
    assert_eq!(clock.min_tick(), -4.0);
    assert_eq!(clock.scheduling(), Scheduling::Manual);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "(tick_length_ms: ").unwrap();

    assert!(matches!(
        PlaybackConfig::load(&path),
        Err(PlaybackError::Config(_))
    ));
}

#[test]
fn test_out_of_range_file_is_invalid_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slow.json");
    fs::write(&path, r#"{ "playback_speed": 0.0 }"#).unwrap();

    assert!(matches!(
        PlaybackConfig::load(&path),
        Err(PlaybackError::InvalidArgument(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nowhere.ron");

    assert!(matches!(
        PlaybackConfig::load(&path),
        Err(PlaybackError::Io(_))
    ));
}
