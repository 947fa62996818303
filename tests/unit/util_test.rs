//! Tests for utility functions

use request_spawner::util::{merge_params, now_ms, strip_adapter, RequestOptions, ADAPTER_FIELD};
use serde_json::{json, Value};

fn object(value: Value) -> RequestOptions {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn test_merge_overrides_scalars() {
    let base = object(json!({"url": "/items", "page": 1}));
    let overrides = object(json!({"page": 2}));

    let merged = merge_params(&base, &overrides);
    assert_eq!(Value::Object(merged), json!({"url": "/items", "page": 2}));
}

#[test]
fn test_merge_is_deep_for_objects() {
    let base = object(json!({"headers": {"accept": "json", "lang": "en"}}));
    let overrides = object(json!({"headers": {"lang": "de", "auth": "t"}}));

    let merged = merge_params(&base, &overrides);
    assert_eq!(
        Value::Object(merged),
        json!({"headers": {"accept": "json", "lang": "de", "auth": "t"}})
    );
}

#[test]
fn test_merge_replaces_arrays_and_mismatched_types() {
    let base = object(json!({"ids": [1, 2], "filter": {"a": 1}}));
    let overrides = object(json!({"ids": [3], "filter": "none"}));

    let merged = merge_params(&base, &overrides);
    assert_eq!(Value::Object(merged), json!({"ids": [3], "filter": "none"}));
}

#[test]
fn test_merge_leaves_base_untouched() {
    let base = object(json!({"page": 1}));
    let _ = merge_params(&base, &object(json!({"page": 5})));
    assert_eq!(base.get("page"), Some(&json!(1)));
}

#[test]
fn test_strip_adapter() {
    let mut params = object(json!({ADAPTER_FIELD: "http", "url": "/"}));
    assert_eq!(strip_adapter(&mut params), Some("http".to_string()));
    assert!(!params.contains_key(ADAPTER_FIELD));

    let mut params = object(json!({"url": "/"}));
    assert_eq!(strip_adapter(&mut params), None);

    let mut params = object(json!({ADAPTER_FIELD: 3}));
    assert_eq!(strip_adapter(&mut params), None);
    assert!(params.is_empty());
}

#[test]
fn test_now_ms_advances() {
    let first = now_ms();
    assert!(first > 0);
    assert!(now_ms() >= first);
}
