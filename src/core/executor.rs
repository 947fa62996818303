//! Executor traits: the boundary between the spawner and the work it dispatches.
//!
//! The spawner never runs requests itself. On dispatch it hands merged
//! [`RequestOptions`] to an [`Executor`] (selected by the `adapter` field) or to a
//! preconfigured [`Service`], and receives an [`ActiveRequest`] back.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::event::EventBus;
use super::request::TaskRequest;
use super::timer::Spawn;
use super::{RequestError, SpawnError};
use crate::util::RequestOptions;

/// An in-flight unit of work returned by an executor.
///
/// # Example
///
/// ```rust,ignore
/// use request_spawner::core::{ActiveRequest, EventBus, RequestError};
///
/// struct Prefetched { events: EventBus, value: serde_json::Value }
///
/// #[async_trait::async_trait]
/// impl ActiveRequest for Prefetched {
///     fn events(&self) -> &EventBus { &self.events }
///     async fn cancel(&self) -> Result<(), RequestError> { Ok(()) }
///     async fn outcome(&self) -> Result<serde_json::Value, RequestError> { Ok(self.value.clone()) }
///     fn settled(&self) -> Option<Result<serde_json::Value, RequestError>> { Some(Ok(self.value.clone())) }
/// }
/// ```
#[async_trait]
pub trait ActiveRequest: Send + Sync + 'static {
    /// Event capability of the request. Emits `done`/`fail`, then `finish`, or `cancel`.
    fn events(&self) -> &EventBus;

    /// Cancel the request. Returns once cancellation is complete, immediately if
    /// the request already finished.
    async fn cancel(&self) -> Result<(), RequestError>;

    /// Wait for the request's result.
    async fn outcome(&self) -> Result<Value, RequestError>;

    /// The result, if the request already settled.
    fn settled(&self) -> Option<Result<Value, RequestError>>;
}

/// Shared handle to an active request.
pub type RequestHandle = Arc<dyn ActiveRequest>;

/// Execution hints handed to executors alongside the parameters.
///
/// The scheduler never enforces these; executors decide what to honor.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Runtime the request should run on.
    pub runtime: Arc<dyn Spawn>,
    /// Upper bound on execution time; zero means none.
    pub timeout: Duration,
    /// Reserved single-shot flag.
    pub once: bool,
    /// Reserved flag for chained executors.
    pub continue_on_fail: bool,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("timeout", &self.timeout)
            .field("once", &self.once)
            .field("continue_on_fail", &self.continue_on_fail)
            .finish_non_exhaustive()
    }
}

/// Generic executor selected by the `adapter` field.
pub trait Executor: Send + Sync + 'static {
    /// Start a request with already-merged parameters (selector field stripped).
    fn execute(
        &self,
        params: RequestOptions,
        cx: &ExecutionContext,
    ) -> Result<RequestHandle, RequestError>;
}

/// A preconfigured service that owns its own defaults.
///
/// When a spawner's base is a service, caller parameters go to it unmerged.
pub trait Service: Send + Sync + 'static {
    /// Start a request with the caller's parameters.
    fn do_request(
        &self,
        params: RequestOptions,
        cx: &ExecutionContext,
    ) -> Result<RequestHandle, RequestError>;
}

/// Executor backed by an async closure; each call runs as a [`TaskRequest`].
pub struct FnExecutor<F> {
    run: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(RequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
{
    /// Wrap `run` as an executor.
    pub const fn new(run: F) -> Self {
        Self { run }
    }
}

impl<F, Fut> Executor for FnExecutor<F>
where
    F: Fn(RequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
{
    fn execute(
        &self,
        params: RequestOptions,
        cx: &ExecutionContext,
    ) -> Result<RequestHandle, RequestError> {
        let request: RequestHandle = TaskRequest::spawn(cx, (self.run)(params));
        Ok(request)
    }
}

impl<F, Fut> Service for FnExecutor<F>
where
    F: Fn(RequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
{
    fn do_request(
        &self,
        params: RequestOptions,
        cx: &ExecutionContext,
    ) -> Result<RequestHandle, RequestError> {
        self.execute(params, cx)
    }
}

/// Named executors, resolved from the `adapter` field at dispatch.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Executor>>,
    default: Option<String>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` under `name`. The first registration becomes the default.
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn Executor>) {
        let name = name.into();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.adapters.insert(name, executor);
    }

    /// Use `name` when parameters carry no `adapter` field.
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default = Some(name.into());
    }

    /// Look up an executor, falling back to the default when `name` is absent.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Executor>, SpawnError> {
        let name = match name {
            Some(name) => name,
            None => self.default.as_deref().ok_or(SpawnError::MissingAdapter)?,
        };
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownAdapter(name.to_string()))
    }

    /// Number of registered executors.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no executor is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.adapters.keys().collect();
        names.sort();
        f.debug_struct("AdapterRegistry")
            .field("adapters", &names)
            .field("default", &self.default)
            .finish()
    }
}
