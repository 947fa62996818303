//! Error types for spawner and request operations.

use std::time::Duration;

use thiserror::Error;

use crate::util::PlaceholderId;

/// Errors produced by the spawner and its admission policies.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// A placeholder was bound to a second active request.
    #[error("placeholder {0} is already bound to an active request")]
    AlreadyBound(PlaceholderId),
    /// A mode name did not match any built-in policy.
    #[error("unknown spawn mode: {0}")]
    UnknownMode(String),
    /// The `adapter` field named an executor that is not registered.
    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),
    /// No `adapter` field was given and the registry has no default.
    #[error("no adapter selected and no default adapter registered")]
    MissingAdapter,
    /// Configuration values were rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No async runtime was available to drive timers.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
    /// The executor refused to start the request.
    #[error("request error: {0}")]
    Request(#[from] RequestError),
}

/// Failures reported by an active request.
///
/// Cloneable so the same failure can be observed by every subscriber and
/// by the placeholder outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    /// Execution failed with a message.
    #[error("request failed: {0}")]
    Failed(String),
    /// Execution failed with a structured payload.
    #[error("request rejected: {0}")]
    Rejected(serde_json::Value),
    /// Execution exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The request was cancelled before it produced a result.
    #[error("request cancelled")]
    Cancelled,
    /// The task driving the request went away without reporting.
    #[error("request task aborted")]
    Aborted,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
