//! Tests for error types

use std::time::Duration;

use request_spawner::core::{RequestError, SpawnError};
use serde_json::json;

#[test]
fn test_already_bound_error() {
    let err = SpawnError::AlreadyBound(7);
    assert_eq!(format!("{}", err), "placeholder 7 is already bound to an active request");
}

#[test]
fn test_unknown_mode_error() {
    let err = SpawnError::UnknownMode("burst".to_string());
    assert_eq!(format!("{}", err), "unknown spawn mode: burst");
}

#[test]
fn test_unknown_adapter_error() {
    let err = SpawnError::UnknownAdapter("grpc".to_string());
    assert_eq!(format!("{}", err), "unknown adapter: grpc");
}

#[test]
fn test_missing_adapter_error() {
    let err = SpawnError::MissingAdapter;
    assert_eq!(
        format!("{}", err),
        "no adapter selected and no default adapter registered"
    );
}

#[test]
fn test_request_errors() {
    assert_eq!(
        RequestError::Failed("boom".into()).to_string(),
        "request failed: boom"
    );
    assert_eq!(
        RequestError::Rejected(json!({"status": 500})).to_string(),
        "request rejected: {\"status\":500}"
    );
    assert_eq!(
        RequestError::Timeout(Duration::from_millis(250)).to_string(),
        "request timed out after 250ms"
    );
    assert_eq!(RequestError::Cancelled.to_string(), "request cancelled");
}

#[test]
fn test_request_error_converts_into_spawn_error() {
    let err: SpawnError = RequestError::Aborted.into();
    assert!(matches!(err, SpawnError::Request(RequestError::Aborted)));
    assert_eq!(err.to_string(), "request error: request task aborted");
}
