//! The spawner: creates placeholders, runs the admission policy and dispatches.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::audit::{build_audit_event, AuditSink};
use super::event::{EventBus, EventKind, RequestEvent};
use super::executor::{AdapterRegistry, ExecutionContext, RequestHandle, Service};
use super::placeholder::{Cancellation, Placeholder, PlaceholderStatus};
use super::policy::{Policy, PolicyContext, SpawnMode};
use super::state::{SchedulerState, SharedState};
use super::timer::Spawn;
use super::{RequestError, SpawnError};
use crate::runtime::TokioSpawner;
use crate::util::{merge_params, strip_adapter, PlaceholderId, RequestOptions};

/// Default request parameters, or a preconfigured service that takes the
/// caller's parameters as-is.
#[derive(Clone)]
pub enum Base {
    /// Parameters merged under every spawn's parameters.
    Options(RequestOptions),
    /// Service that owns its defaults; dispatch delegates to it directly.
    Service(Arc<dyn Service>),
}

impl Default for Base {
    fn default() -> Self {
        Self::Options(RequestOptions::new())
    }
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// Spawner configuration, fixed for the spawner's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SpawnerOptions {
    /// Default parameters or delegate service.
    pub base: Base,
    /// Policy timing parameter.
    pub delay: Duration,
    /// Admission policy.
    pub mode: SpawnMode,
    /// Debounce fires immediately when the queue is empty.
    pub leading: bool,
    /// Passed to executors.
    pub once: bool,
    /// Passed to executors; zero means no timeout.
    pub timeout: Duration,
    /// Passed to executors.
    pub continue_on_fail: bool,
}

impl SpawnerOptions {
    /// Options with the default mode and no delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admission policy.
    #[must_use]
    pub fn with_mode(mut self, mode: SpawnMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the policy delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the base parameters or service.
    #[must_use]
    pub fn with_base(mut self, base: Base) -> Self {
        self.base = base;
        self
    }

    /// Fire debounce immediately on an empty queue.
    #[must_use]
    pub const fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    /// Executor timeout hint.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executor single-shot hint.
    #[must_use]
    pub const fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Executor continue-on-fail hint.
    #[must_use]
    pub const fn with_continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    /// Reject combinations no policy can honor.
    ///
    /// # Errors
    ///
    /// [`SpawnError::InvalidConfig`] for an interval without a delay.
    pub fn validate(&self) -> Result<(), SpawnError> {
        if matches!(self.mode, SpawnMode::Interval) && self.delay.is_zero() {
            return Err(SpawnError::InvalidConfig(
                "interval mode requires a non-zero delay".into(),
            ));
        }
        Ok(())
    }
}

/// Result of [`Spawner::stop`].
#[derive(Debug, Default)]
pub struct StopReport {
    /// Placeholders whose cancellation completed.
    pub cancelled: usize,
    /// Placeholders whose request failed to cancel.
    pub failures: Vec<(PlaceholderId, RequestError)>,
}

impl StopReport {
    /// Whether every cancellation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub(crate) struct Shared {
    name: String,
    options: SpawnerOptions,
    state: SharedState,
    runtime: Arc<dyn Spawn>,
    adapters: AdapterRegistry,
    events: EventBus,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl Shared {
    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            runtime: Arc::clone(&self.runtime),
            timeout: self.options.timeout,
            once: self.options.once,
            continue_on_fail: self.options.continue_on_fail,
        }
    }

    fn execute(&self, params: &RequestOptions) -> Result<RequestHandle, SpawnError> {
        let cx = self.context();
        let request = match &self.options.base {
            Base::Service(service) => service.do_request(params.clone(), &cx)?,
            Base::Options(base) => {
                let mut merged = merge_params(base, params);
                let adapter = strip_adapter(&mut merged);
                let executor = self.adapters.resolve(adapter.as_deref())?;
                executor.execute(merged, &cx)?
            }
        };
        self.state.lock().mark_called();
        Ok(request)
    }

    fn announce(&self, id: PlaceholderId, request: &RequestHandle) {
        request.events().forward_to(&self.events);
        self.record(Some(id), "dispatch");
        tracing::info!(spawner = %self.name, placeholder = id, "dispatched");
    }

    fn record(&self, placeholder: Option<PlaceholderId>, action: &str) {
        if let Some(audit) = &self.audit {
            audit.lock().record(build_audit_event(
                placeholder,
                self.name.as_str(),
                action,
                None,
            ));
        }
    }
}

/// Triggers dispatch for one placeholder.
///
/// Handed to policies inside [`PolicyContext`]; clone it into timers or event
/// handlers to dispatch later.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    placeholder: Placeholder,
    params: Arc<RequestOptions>,
}

impl Dispatcher {
    /// The placeholder this dispatcher serves.
    pub const fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    /// Hand the merged parameters to the executor and bind the resulting request.
    ///
    /// Returns `Ok(false)` without calling the executor when the placeholder was
    /// cancelled. An executor that fails to start the request settles the
    /// placeholder as failed and also returns `Ok(false)`; the failure is
    /// observed through the placeholder's `fail` event and outcome.
    ///
    /// # Errors
    ///
    /// [`SpawnError::AlreadyBound`] when the placeholder was dispatched before,
    /// and executor resolution failures.
    pub fn dispatch(&self) -> Result<bool, SpawnError> {
        let id = self.placeholder.id();
        match self.placeholder.status() {
            PlaceholderStatus::Pending => {}
            PlaceholderStatus::Cancelled => {
                tracing::debug!(placeholder = id, "skipping dispatch of cancelled placeholder");
                return Ok(false);
            }
            PlaceholderStatus::Active | PlaceholderStatus::Finished => {
                return Err(SpawnError::AlreadyBound(id));
            }
        }

        let request = match self.shared.execute(&self.params) {
            Ok(request) => request,
            Err(SpawnError::Request(reason)) => {
                tracing::warn!(
                    spawner = %self.shared.name,
                    placeholder = id,
                    "request failed to start: {reason}"
                );
                self.placeholder.reject(reason);
                return Ok(false);
            }
            Err(err) => {
                self.placeholder.reject(RequestError::Failed(err.to_string()));
                return Err(err);
            }
        };

        match self.placeholder.bind(Arc::clone(&request)) {
            Ok(true) => {
                self.shared.announce(id, &request);
                Ok(true)
            }
            Ok(false) => {
                tracing::debug!(placeholder = id, "cancelled while dispatching");
                self.discard(request);
                Ok(false)
            }
            Err(err) => {
                self.discard(request);
                Err(err)
            }
        }
    }

    /// Start an independent request without binding the placeholder, announcing
    /// it as a `tick` event on the placeholder.
    ///
    /// # Errors
    ///
    /// Executor resolution or start failures.
    pub fn dispatch_detached(&self) -> Result<RequestHandle, SpawnError> {
        let request = self.shared.execute(&self.params)?;
        self.shared.announce(self.placeholder.id(), &request);
        self.placeholder
            .emit(&RequestEvent::Tick(Arc::clone(&request)));
        Ok(request)
    }

    /// Dispatch from a timer or event handler, where errors have no caller.
    pub fn dispatch_deferred(&self) {
        if let Err(err) = self.dispatch() {
            tracing::error!(
                spawner = %self.shared.name,
                placeholder = self.placeholder.id(),
                "deferred dispatch failed: {err}"
            );
        }
    }

    fn discard(&self, request: RequestHandle) {
        self.shared.runtime.spawn(Box::pin(async move {
            let _ = request.cancel().await;
        }));
    }
}

/// Request-admission scheduler.
///
/// Each [`Spawner::spawn`] creates a [`Placeholder`], enqueues it and lets the
/// configured [`SpawnMode`] decide when it is dispatched. Clones share state.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use request_spawner::builders::SpawnerBuilder;
/// use request_spawner::core::{FnExecutor, SpawnMode, SpawnerOptions};
///
/// let spawner = SpawnerBuilder::new(
///     SpawnerOptions::new()
///         .with_mode(SpawnMode::Debounce)
///         .with_delay(Duration::from_millis(300)),
/// )
/// .with_adapter("fetch", FnExecutor::new(|params| async move { Ok(params.into()) }))
/// .build()?;
///
/// let search = spawner.spawn(params)?;
/// let result = search.outcome().await?; // None if a later call superseded it
/// ```
#[derive(Clone)]
pub struct Spawner {
    shared: Arc<Shared>,
}

impl Spawner {
    /// Spawner on the current tokio runtime with no adapters registered.
    ///
    /// # Errors
    ///
    /// Invalid options, or no tokio runtime.
    pub fn new(options: SpawnerOptions) -> Result<Self, SpawnError> {
        let runtime: Arc<dyn Spawn> = Arc::new(TokioSpawner::current()?);
        Self::from_parts("spawner".into(), options, runtime, AdapterRegistry::new(), None)
    }

    pub(crate) fn from_parts(
        name: String,
        options: SpawnerOptions,
        runtime: Arc<dyn Spawn>,
        adapters: AdapterRegistry,
        audit: Option<Box<dyn AuditSink>>,
    ) -> Result<Self, SpawnError> {
        options.validate()?;
        tracing::debug!(spawner = %name, mode = options.mode.name(), "spawner created");
        Ok(Self {
            shared: Arc::new(Shared {
                name,
                options,
                state: SchedulerState::shared(),
                runtime,
                adapters,
                events: EventBus::new(),
                audit: audit.map(|sink| Arc::new(Mutex::new(sink))),
            }),
        })
    }

    /// Request a unit of work. The placeholder is returned at once; dispatch
    /// happens now, later or never depending on the mode.
    ///
    /// # Errors
    ///
    /// Policy misuse, such as an unknown adapter or a double dispatch. A request
    /// the executor refuses to start settles the placeholder as failed instead.
    pub fn spawn(&self, params: RequestOptions) -> Result<Placeholder, SpawnError> {
        let placeholder = Placeholder::new(Arc::clone(&self.shared.runtime));
        let id = placeholder.id();

        let weak = Arc::downgrade(&self.shared);
        let on_finish = move |_: &RequestEvent| release(&weak, id, "finish");
        let weak = Arc::downgrade(&self.shared);
        let on_cancel = move |_: &RequestEvent| release(&weak, id, "cancel");
        placeholder
            .on(EventKind::Finish, on_finish)
            .on(EventKind::Cancel, on_cancel);

        self.shared.record(Some(id), "spawn");
        tracing::debug!(
            spawner = %self.shared.name,
            placeholder = id,
            mode = self.shared.options.mode.name(),
            "spawn"
        );

        let cx = PolicyContext {
            state: &self.shared.state,
            spawner: self,
            options: &self.shared.options,
            placeholder: &placeholder,
            dispatcher: Dispatcher {
                shared: Arc::clone(&self.shared),
                placeholder: placeholder.clone(),
                params: Arc::new(params),
            },
            runtime: &self.shared.runtime,
        };
        self.shared.options.mode.admit(cx)?;
        Ok(placeholder)
    }

    /// Cancel every live placeholder and close any blocking window.
    ///
    /// Cancellation starts immediately; the returned future reports once every
    /// underlying request finished cancelling. Failures are collected, never
    /// raised. The spawner stays usable.
    pub fn stop(&self) -> impl Future<Output = StopReport> + Send + 'static {
        let live: Vec<Placeholder> = {
            let mut state = self.shared.state.lock();
            let window = state.open_window();
            state.close_window(window);
            state.queue().to_vec()
        };
        tracing::info!(spawner = %self.shared.name, live = live.len(), "stopping");

        let pending: Vec<(PlaceholderId, Cancellation)> = live
            .iter()
            .map(|placeholder| (placeholder.id(), placeholder.cancel()))
            .collect();
        let shared = Arc::clone(&self.shared);
        async move {
            let mut report = StopReport::default();
            for (id, cancellation) in pending {
                match cancellation.await {
                    Ok(()) => report.cancelled += 1,
                    Err(err) => {
                        tracing::warn!(placeholder = id, "cancel failed during stop: {err}");
                        report.failures.push((id, err));
                    }
                }
            }
            for (id, _) in &report.failures {
                shared.state.lock().remove(*id);
            }
            shared.record(None, "stop");
            report
        }
    }

    /// Observe events of every request this spawner dispatches.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> &Self
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, handler);
        self
    }

    /// Number of live placeholders.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().len()
    }

    /// Whether a throttle or debounce window is open.
    pub fn is_blocked(&self) -> bool {
        self.shared.state.lock().is_blocked()
    }

    /// Whether anything was dispatched yet.
    pub fn is_called(&self) -> bool {
        self.shared.state.lock().is_called()
    }

    /// Configured options.
    pub fn options(&self) -> &SpawnerOptions {
        &self.shared.options
    }

    /// Name used in logs and audit events.
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("name", &self.shared.name)
            .field("mode", &self.shared.options.mode)
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

fn release(shared: &Weak<Shared>, id: PlaceholderId, action: &str) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let removed = shared.state.lock().remove(id);
    if removed {
        shared.record(Some(id), action);
    }
}
