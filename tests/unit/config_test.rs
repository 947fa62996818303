//! Tests for configuration validation

use std::time::Duration;

use request_spawner::config::SpawnerConfig;
use request_spawner::core::{Base, SpawnMode};
use serde_json::json;

#[test]
fn test_default_config_is_valid() {
    let cfg = SpawnerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.mode_name(), "default");
}

#[test]
fn test_unknown_mode_is_rejected() {
    let cfg = SpawnerConfig {
        mode: Some("burst".into()),
        ..SpawnerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("burst"));
}

#[test]
fn test_interval_requires_time() {
    let invalid = SpawnerConfig {
        mode: Some("interval".into()),
        ..SpawnerConfig::default()
    };
    assert!(invalid.validate().is_err());

    let valid = SpawnerConfig {
        time: 1_000,
        ..invalid
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_config_from_json() {
    let cfg = SpawnerConfig::from_json_str(
        r#"{"mode":"debounce","time":300,"leading":true,"base":{"url":"/search"},"continueOnFail":true}"#,
    )
    .expect("config");

    assert_eq!(cfg.mode_name(), "debounce");
    assert_eq!(cfg.time, 300);
    assert!(cfg.leading);
    assert!(cfg.continue_on_fail);
    assert_eq!(cfg.base.get("url"), Some(&json!("/search")));
}

#[test]
fn test_config_from_json_rejects_bad_input() {
    assert!(SpawnerConfig::from_json_str("{not json").is_err());
    assert!(SpawnerConfig::from_json_str(r#"{"mode":"interval"}"#).is_err());
}

#[test]
fn test_config_to_options() {
    let cfg = SpawnerConfig {
        mode: Some("queue".into()),
        time: 50,
        timeout: 2_000,
        ..SpawnerConfig::default()
    };
    let options = cfg.to_options().expect("options");

    assert!(matches!(options.mode, SpawnMode::Queue));
    assert_eq!(options.delay, Duration::from_millis(50));
    assert_eq!(options.timeout, Duration::from_secs(2));
    assert!(matches!(options.base, Base::Options(ref base) if base.is_empty()));
}

#[test]
fn test_config_from_env() {
    std::env::set_var("SPAWNER_MODE", "throttle");
    std::env::set_var("SPAWNER_TIME_MS", "120");
    std::env::set_var("SPAWNER_LEADING", "true");

    let cfg = SpawnerConfig::from_env().expect("env config");

    std::env::remove_var("SPAWNER_MODE");
    std::env::remove_var("SPAWNER_TIME_MS");
    std::env::remove_var("SPAWNER_LEADING");

    assert_eq!(cfg.mode_name(), "throttle");
    assert_eq!(cfg.time, 120);
    assert!(cfg.leading);
}
