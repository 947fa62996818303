//! Core scheduling abstractions: placeholders, policies and the spawner.

pub mod audit;
pub mod error;
pub mod event;
pub mod executor;
pub mod placeholder;
pub mod policy;
pub mod request;
pub mod spawner;
pub mod state;
pub mod timer;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink};
pub use error::{AppResult, RequestError, SpawnError};
pub use event::{EventBus, EventKind, Handler, RequestEvent, SubscriptionId};
pub use executor::{
    ActiveRequest, AdapterRegistry, ExecutionContext, Executor, FnExecutor, RequestHandle,
    Service,
};
pub use placeholder::{Cancellation, Outcome, Placeholder, PlaceholderStatus};
pub use policy::{Policy, PolicyContext, SpawnMode};
pub use request::TaskRequest;
pub use spawner::{Base, Dispatcher, SpawnerOptions, Spawner, StopReport};
pub use state::{SchedulerState, SharedState};
pub use timer::{BoxFuture, Spawn, TaskHandle, TimerHandle};
