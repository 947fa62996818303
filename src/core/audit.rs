//! Audit sink implementations.
//!
//! Records placeholder lifecycle actions (spawn, dispatch, finish, cancel, stop)
//! for later inspection.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::PlaceholderId;

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related placeholder, absent for spawner-wide actions.
    pub placeholder: Option<PlaceholderId>,
    /// Spawner name.
    pub spawner: String,
    /// Action taken (spawn, dispatch, finish, cancel, stop).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards every event to a shared in-memory buffer, so callers can
/// keep reading events after handing the sink to a spawner.
#[derive(Clone)]
pub struct SharedAuditSink {
    inner: std::sync::Arc<parking_lot::Mutex<InMemoryAuditSink>>,
}

impl SharedAuditSink {
    /// Create a sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(InMemoryAuditSink::new(
                max_events,
            ))),
        }
    }

    /// Snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().events()
    }
}

impl AuditSink for SharedAuditSink {
    fn record(&mut self, event: AuditEvent) {
        self.inner.lock().record(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    placeholder: Option<PlaceholderId>,
    spawner: impl Into<String>,
    action: impl Into<String>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        placeholder,
        spawner: spawner.into(),
        action: action.into(),
        created_at_ms: now_ms(),
        payload,
    }
}
