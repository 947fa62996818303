//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use request_spawner::builders::SpawnerBuilder;
use request_spawner::config::SpawnerConfig;
use request_spawner::core::{FnExecutor, SpawnError, SpawnMode, SpawnerOptions};
use request_spawner::runtime::TokioSpawner;
use serde_json::{json, Value};

#[tokio::test]
async fn test_builder_defaults() {
    let spawner = SpawnerBuilder::new(SpawnerOptions::new())
        .build()
        .expect("spawner");

    assert_eq!(spawner.name(), "spawner");
    assert!(matches!(spawner.options().mode, SpawnMode::Default));
    assert_eq!(spawner.queued(), 0);
    assert!(!spawner.is_called());
}

#[tokio::test]
async fn test_builder_from_config() {
    let cfg = SpawnerConfig {
        mode: Some("delay".into()),
        time: 40,
        ..SpawnerConfig::default()
    };
    let spawner = SpawnerBuilder::from_config(&cfg)
        .expect("builder")
        .with_name("search")
        .build()
        .expect("spawner");

    assert_eq!(spawner.name(), "search");
    assert!(matches!(spawner.options().mode, SpawnMode::Delay));
    assert_eq!(spawner.options().delay, Duration::from_millis(40));
}

#[test]
fn test_builder_from_invalid_config() {
    let cfg = SpawnerConfig {
        mode: Some("burst".into()),
        ..SpawnerConfig::default()
    };
    let err = SpawnerBuilder::from_config(&cfg).err().expect("error");
    assert!(matches!(err, SpawnError::InvalidConfig(_)));
}

#[test]
fn test_builder_without_runtime_fails() {
    let result = SpawnerBuilder::new(SpawnerOptions::new()).build();
    assert!(matches!(result, Err(SpawnError::Runtime(_))));
}

#[test]
fn test_builder_with_explicit_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let spawner = SpawnerBuilder::new(SpawnerOptions::new())
        .with_runtime(Arc::new(TokioSpawner::new(runtime.handle().clone())))
        .with_adapter("echo", FnExecutor::new(|params| async move { Ok(Value::Object(params)) }))
        .build()
        .expect("spawner");

    let placeholder = runtime.block_on(async {
        let mut params = serde_json::Map::new();
        params.insert("q".into(), json!("rust"));
        spawner.spawn(params).expect("spawn")
    });

    let outcome = runtime.block_on(placeholder.outcome());
    assert_eq!(outcome, Ok(Some(json!({"q": "rust"}))));
}

#[tokio::test]
async fn test_builder_default_adapter_selection() {
    let spawner = SpawnerBuilder::new(SpawnerOptions::new())
        .with_adapter("first", FnExecutor::new(|_| async { Ok(json!("first")) }))
        .with_adapter("second", FnExecutor::new(|_| async { Ok(json!("second")) }))
        .with_default_adapter("second")
        .build()
        .expect("spawner");

    let placeholder = spawner.spawn(serde_json::Map::new()).expect("spawn");
    assert_eq!(placeholder.outcome().await, Ok(Some(json!("second"))));
}

#[tokio::test]
async fn test_builder_without_adapters_reports_missing() {
    let spawner = SpawnerBuilder::new(SpawnerOptions::new())
        .build()
        .expect("spawner");

    let err = spawner.spawn(serde_json::Map::new()).unwrap_err();
    assert!(matches!(err, SpawnError::MissingAdapter));
}
