//! Named events and the listener bus shared by placeholders, requests and spawners.
//!
//! An [`EventBus`] is a cheap-to-clone handle over a listener list. Handlers run
//! synchronously on the emitting task, in registration order. The listener list is
//! never locked while a handler runs, so handlers may subscribe, unsubscribe or emit
//! on the same bus.
//!
//! [`EventBus::forward_to`] proxies every event of one bus into another. A
//! placeholder uses it to adopt the events of the request it is bound to, and the
//! spawner uses it to observe every request it dispatches.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::{RequestError, RequestHandle};

/// Event emitted over the lifecycle of a placeholder or request.
#[derive(Clone)]
pub enum RequestEvent {
    /// A placeholder was bound to its active request.
    Receive(RequestHandle),
    /// An interval placeholder dispatched an independent request.
    Tick(RequestHandle),
    /// The request produced a result.
    Done(Value),
    /// The request failed.
    Fail(RequestError),
    /// The request completed, successfully or not.
    Finish,
    /// The placeholder or request was cancelled.
    Cancel,
    /// Executor-specific event.
    Custom {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
    },
}

impl RequestEvent {
    /// The subscription key this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Receive(_) => EventKind::Receive,
            Self::Tick(_) => EventKind::Tick,
            Self::Done(_) => EventKind::Done,
            Self::Fail(_) => EventKind::Fail,
            Self::Finish => EventKind::Finish,
            Self::Cancel => EventKind::Cancel,
            Self::Custom { name, .. } => EventKind::Custom(name.clone()),
        }
    }
}

impl fmt::Debug for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receive(_) => f.write_str("Receive(..)"),
            Self::Tick(_) => f.write_str("Tick(..)"),
            Self::Done(value) => f.debug_tuple("Done").field(value).finish(),
            Self::Fail(err) => f.debug_tuple("Fail").field(err).finish(),
            Self::Finish => f.write_str("Finish"),
            Self::Cancel => f.write_str("Cancel"),
            Self::Custom { name, payload } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("payload", payload)
                .finish(),
        }
    }
}

/// Event name used to subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`RequestEvent::Receive`].
    Receive,
    /// See [`RequestEvent::Tick`].
    Tick,
    /// See [`RequestEvent::Done`].
    Done,
    /// See [`RequestEvent::Fail`].
    Fail,
    /// See [`RequestEvent::Finish`].
    Finish,
    /// See [`RequestEvent::Cancel`].
    Cancel,
    /// See [`RequestEvent::Custom`].
    Custom(String),
}

/// Listener callback.
pub type Handler = Arc<dyn Fn(&RequestEvent) + Send + Sync>;

/// Token returned by a subscription, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    filter: Option<EventKind>,
    handler: Handler,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Publish/subscribe channel keyed by [`EventKind`].
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.insert(Some(kind), Arc::new(handler))
    }

    /// Register `handler` for every event.
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|entry| entry.id != id);
        listeners.entries.len() != before
    }

    /// Deliver `event` to every matching handler.
    pub fn emit(&self, event: &RequestEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let listeners = self.listeners.lock();
            listeners
                .entries
                .iter()
                .filter(|entry| entry.filter.as_ref().is_none_or(|f| *f == kind))
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Re-emit every event of this bus on `target`.
    pub fn forward_to(&self, target: &Self) -> SubscriptionId {
        let target = target.clone();
        self.on_any(move |event| target.emit(event))
    }

    /// Number of registered handlers.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    fn insert(&self, filter: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = SubscriptionId(listeners.next_id);
        listeners.entries.push(Entry {
            id,
            filter,
            handler,
        });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
