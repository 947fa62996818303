//! Tests for audit sink

use request_spawner::core::{build_audit_event, AuditSink, InMemoryAuditSink, SharedAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(Some(1), "search", "spawn", Some("payload".to_string()));

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].placeholder, Some(1));
    assert_eq!(events[0].action, "spawn");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event(Some(1), "search", "spawn", None));
    sink.record(build_audit_event(Some(2), "search", "spawn", None));
    sink.record(build_audit_event(Some(3), "search", "spawn", None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].placeholder, Some(2)); // First one popped
    assert_eq!(events[1].placeholder, Some(3));
}

#[test]
fn test_zero_capacity_sink_records_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(None, "search", "stop", None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shared_sink_is_readable_after_handoff() {
    let sink = SharedAuditSink::new(4);
    let mut handed: Box<dyn AuditSink> = Box::new(sink.clone());

    handed.record(build_audit_event(None, "search", "stop", None));

    assert_eq!(sink.events().len(), 1);
    assert_eq!(sink.events()[0].action, "stop");
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(Some(42), "feed", "dispatch", Some("result".to_string()));

    assert_eq!(event.placeholder, Some(42));
    assert_eq!(event.spawner, "feed");
    assert_eq!(event.action, "dispatch");
    assert_eq!(event.payload, Some("result".to_string()));
    assert!(event.created_at_ms > 0);
    assert_ne!(event.event_id, build_audit_event(Some(42), "feed", "dispatch", None).event_id);
}
