//! Caller-visible handle for a unit of work that may not have started yet.
//!
//! A [`Placeholder`] is returned by every `spawn` call. It starts `Pending`, becomes
//! `Active` when a policy dispatches it, and ends `Finished` or `Cancelled`.
//!
//! The subscription and outcome surface never changes identity: before dispatch,
//! handlers live on the placeholder's own bus; once bound, every event of the
//! active request is forwarded into that same bus, so handlers registered at any
//! point observe the request.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{oneshot, watch};

use super::event::{EventBus, EventKind, RequestEvent, SubscriptionId};
use super::executor::RequestHandle;
use super::timer::Spawn;
use super::{RequestError, SpawnError};
use crate::util::PlaceholderId;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Final value of a placeholder: `Ok(Some(_))` on completion, `Ok(None)` on
/// cancellation, `Err(_)` when the bound request itself failed.
pub type Outcome = Result<Option<Value>, RequestError>;

/// Observable lifecycle of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStatus {
    /// Created and enqueued, no request dispatched yet.
    Pending,
    /// Bound to an in-flight request.
    Active,
    /// The bound request completed.
    Finished,
    /// Cancelled from either pending or active.
    Cancelled,
}

impl PlaceholderStatus {
    /// Whether the placeholder is inert for good.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

struct Inner {
    id: PlaceholderId,
    events: EventBus,
    status: watch::Sender<PlaceholderStatus>,
    outcome: watch::Sender<Option<Outcome>>,
    request: Mutex<Option<RequestHandle>>,
    runtime: Arc<dyn Spawn>,
}

/// Handle for one spawned unit of work. Clones share identity.
///
/// Callers observe events but cannot raise them:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use request_spawner::core::{Placeholder, RequestEvent, Spawn};
///
/// fn forge(runtime: Arc<dyn Spawn>) {
///     Placeholder::new(runtime).emit(&RequestEvent::Finish);
/// }
/// ```
#[derive(Clone)]
pub struct Placeholder {
    inner: Arc<Inner>,
}

impl Placeholder {
    /// Create a pending placeholder whose cancellations run on `runtime`.
    pub fn new(runtime: Arc<dyn Spawn>) -> Self {
        let (status, _) = watch::channel(PlaceholderStatus::Pending);
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                events: EventBus::new(),
                status,
                outcome,
                request: Mutex::new(None),
                runtime,
            }),
        }
    }

    /// Process-unique identifier.
    pub fn id(&self) -> PlaceholderId {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PlaceholderStatus {
        *self.inner.status.borrow()
    }

    /// Whether no request has been dispatched and the placeholder is still live.
    pub fn is_pending(&self) -> bool {
        self.status() == PlaceholderStatus::Pending
    }

    /// The bound active request, once dispatch began.
    pub fn request(&self) -> Option<RequestHandle> {
        self.inner.request.lock().clone()
    }

    /// Register `handler` for `kind`; returns the placeholder for chaining.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> &Self
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler);
        self
    }

    /// Register `handler` for `kind` and keep the token for [`Placeholder::off`].
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    /// Remove a subscription made with [`Placeholder::subscribe`].
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.events.off(id)
    }

    /// Emit an event on the placeholder's bus. Lifecycle events only originate
    /// from status transitions.
    pub(crate) fn emit(&self, event: &RequestEvent) {
        self.inner.events.emit(event);
    }

    /// Bind the active request. Returns `Ok(false)` without binding if the
    /// placeholder was cancelled meanwhile.
    ///
    /// # Errors
    ///
    /// [`SpawnError::AlreadyBound`] if a request was bound before.
    pub(crate) fn bind(&self, request: RequestHandle) -> Result<bool, SpawnError> {
        {
            let mut slot = self.inner.request.lock();
            let bound = self.inner.status.send_if_modified(|status| {
                if *status != PlaceholderStatus::Pending {
                    return false;
                }
                *status = PlaceholderStatus::Active;
                true
            });
            if !bound {
                return match self.status() {
                    PlaceholderStatus::Cancelled => Ok(false),
                    _ => Err(SpawnError::AlreadyBound(self.id())),
                };
            }
            *slot = Some(Arc::clone(&request));
        }

        tracing::debug!(placeholder = self.id(), "placeholder bound");
        self.emit(&RequestEvent::Receive(Arc::clone(&request)));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        request.events().on_any(move |event| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.adopt(event);
            }
        });
        if let Some(result) = request.settled() {
            self.complete(result);
        }
        Ok(true)
    }

    /// Mark the placeholder failed without a request, e.g. when dispatch itself failed.
    pub(crate) fn reject(&self, err: RequestError) {
        let failed = self.inner.status.send_if_modified(|status| {
            if *status != PlaceholderStatus::Pending {
                return false;
            }
            *status = PlaceholderStatus::Finished;
            true
        });
        if failed {
            self.settle(Err(err.clone()));
            self.emit(&RequestEvent::Fail(err));
            self.emit(&RequestEvent::Finish);
        }
    }

    /// Cancel the placeholder and, if active, its request.
    ///
    /// Side effects start immediately; the returned future completes once the
    /// underlying request's cancellation has finished. No-op when already
    /// finished or cancelled.
    pub fn cancel(&self) -> Cancellation {
        loop {
            match self.status() {
                PlaceholderStatus::Finished | PlaceholderStatus::Cancelled => {
                    return Cancellation::ready();
                }
                PlaceholderStatus::Pending => {
                    if self.transition_to_cancelled(false) {
                        return Cancellation::ready();
                    }
                }
                PlaceholderStatus::Active => {
                    let Some(request) = self.request() else {
                        continue;
                    };
                    let (tx, rx) = oneshot::channel();
                    let this = self.clone();
                    self.inner.runtime.spawn(Box::pin(async move {
                        let result = request.cancel().await;
                        if let Err(err) = &result {
                            tracing::warn!(placeholder = this.id(), "request cancel failed: {err}");
                        }
                        this.transition_to_cancelled(true);
                        let _ = tx.send(result);
                    }));
                    return Cancellation { rx: Some(rx) };
                }
            }
        }
    }

    /// Wait for the final value.
    pub async fn outcome(&self) -> Outcome {
        let mut rx = self.inner.outcome.subscribe();
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RequestError::Aborted)?;
        settled.clone().unwrap_or(Err(RequestError::Aborted))
    }

    /// The final value, if already settled.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.inner.outcome.borrow().clone()
    }

    /// Run `callback` with the final value once settled.
    pub fn on_settle<F>(&self, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let this = self.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            let outcome = this.outcome().await;
            callback(outcome);
        }));
    }

    /// Wait until dispatch began; `None` if cancelled first.
    pub async fn started(&self) -> Option<RequestHandle> {
        let mut rx = self.inner.status.subscribe();
        let status = *rx
            .wait_for(|status| *status != PlaceholderStatus::Pending)
            .await
            .ok()?;
        match status {
            PlaceholderStatus::Cancelled => None,
            _ => self.request(),
        }
    }

    fn adopt(&self, event: &RequestEvent) {
        match event {
            RequestEvent::Done(value) => {
                if self.settle(Ok(Some(value.clone()))) {
                    self.emit(event);
                }
            }
            RequestEvent::Fail(err) => {
                if self.settle(Err(err.clone())) {
                    self.emit(event);
                }
            }
            RequestEvent::Finish => self.finish(),
            RequestEvent::Cancel => {
                self.transition_to_cancelled(true);
            }
            _ => self.emit(event),
        }
    }

    fn complete(&self, result: Result<Value, RequestError>) {
        match result {
            Err(RequestError::Cancelled) => {
                self.transition_to_cancelled(true);
            }
            Ok(value) => {
                self.adopt(&RequestEvent::Done(value));
                self.finish();
            }
            Err(err) => {
                self.adopt(&RequestEvent::Fail(err));
                self.finish();
            }
        }
    }

    fn finish(&self) {
        let finished = self.inner.status.send_if_modified(|status| {
            if *status != PlaceholderStatus::Active {
                return false;
            }
            *status = PlaceholderStatus::Finished;
            true
        });
        if !finished {
            return;
        }
        let late = self.request().and_then(|request| request.settled());
        self.settle(match late {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(RequestError::Cancelled)) => Ok(None),
            Some(Err(err)) => Err(err),
            None => Err(RequestError::Aborted),
        });
        self.emit(&RequestEvent::Finish);
    }

    fn transition_to_cancelled(&self, from_active: bool) -> bool {
        let cancelled = self.inner.status.send_if_modified(|status| {
            let live = match status {
                PlaceholderStatus::Pending => true,
                PlaceholderStatus::Active => from_active,
                _ => false,
            };
            if live {
                *status = PlaceholderStatus::Cancelled;
            }
            live
        });
        if cancelled {
            tracing::debug!(placeholder = self.id(), "placeholder cancelled");
            self.settle(Ok(None));
            self.emit(&RequestEvent::Cancel);
        }
        cancelled
    }

    fn settle(&self, outcome: Outcome) -> bool {
        self.inner.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Placeholder {}

impl std::fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placeholder")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Completes once a cancellation's side effects have finished.
#[derive(Debug)]
pub struct Cancellation {
    rx: Option<oneshot::Receiver<Result<(), RequestError>>>,
}

impl Cancellation {
    const fn ready() -> Self {
        Self { rx: None }
    }
}

impl Future for Cancellation {
    type Output = Result<(), RequestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().rx.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|result| result.unwrap_or(Err(RequestError::Aborted))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutionContext, TaskRequest};
    use crate::runtime::TokioSpawner;
    use std::time::Duration;

    fn runtime() -> Arc<dyn Spawn> {
        Arc::new(TokioSpawner::current().expect("runtime"))
    }

    fn context(runtime: &Arc<dyn Spawn>) -> ExecutionContext {
        ExecutionContext {
            runtime: Arc::clone(runtime),
            timeout: Duration::ZERO,
            once: false,
            continue_on_fail: false,
        }
    }

    #[tokio::test]
    async fn test_pending_cancel_settles_with_none() {
        let placeholder = Placeholder::new(runtime());
        placeholder.cancel().await.expect("cancel");

        assert_eq!(placeholder.status(), PlaceholderStatus::Cancelled);
        assert_eq!(placeholder.outcome().await, Ok(None));
        assert!(placeholder.started().await.is_none());
    }

    #[tokio::test]
    async fn test_bound_result_propagates_unchanged() {
        let rt = runtime();
        let placeholder = Placeholder::new(Arc::clone(&rt));
        let request: RequestHandle =
            TaskRequest::spawn(&context(&rt), async { Ok(serde_json::json!({"id": 7})) });

        assert!(placeholder.bind(request).expect("bind"));
        assert_eq!(
            placeholder.outcome().await,
            Ok(Some(serde_json::json!({"id": 7})))
        );
        assert_eq!(placeholder.status(), PlaceholderStatus::Finished);
    }

    #[tokio::test]
    async fn test_second_bind_is_reported() {
        let rt = runtime();
        let placeholder = Placeholder::new(Arc::clone(&rt));
        let first: RequestHandle = TaskRequest::spawn(&context(&rt), std::future::pending());
        let second: RequestHandle = TaskRequest::spawn(&context(&rt), std::future::pending());

        placeholder.bind(first).expect("first bind");
        let err = placeholder.bind(second).unwrap_err();
        assert!(matches!(err, SpawnError::AlreadyBound(id) if id == placeholder.id()));
    }

    #[tokio::test]
    async fn test_bind_after_cancel_is_skipped() {
        let rt = runtime();
        let placeholder = Placeholder::new(Arc::clone(&rt));
        let _ = placeholder.cancel();
        let request: RequestHandle = TaskRequest::spawn(&context(&rt), std::future::pending());

        assert!(!placeholder.bind(request).expect("bind"));
        assert!(placeholder.request().is_none());
    }

    #[tokio::test]
    async fn test_active_cancel_cancels_request() {
        let rt = runtime();
        let placeholder = Placeholder::new(Arc::clone(&rt));
        let request: RequestHandle = TaskRequest::spawn(&context(&rt), std::future::pending());
        placeholder.bind(Arc::clone(&request)).expect("bind");

        placeholder.cancel().await.expect("cancel");

        assert_eq!(placeholder.status(), PlaceholderStatus::Cancelled);
        assert_eq!(placeholder.outcome().await, Ok(None));
        assert_eq!(request.settled(), Some(Err(RequestError::Cancelled)));
    }

    #[tokio::test]
    async fn test_terminal_events_fire_once_with_terminal_status() {
        let placeholder = Placeholder::new(runtime());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Finish, EventKind::Cancel] {
            let seen = Arc::clone(&seen);
            let observed = placeholder.clone();
            placeholder.on(kind, move |event| {
                seen.lock().push((event.kind(), observed.status()));
            });
        }

        placeholder.reject(RequestError::Failed("refused".into()));
        placeholder.reject(RequestError::Aborted);
        placeholder.cancel().await.expect("cancel");

        assert_eq!(
            *seen.lock(),
            vec![(EventKind::Finish, PlaceholderStatus::Finished)]
        );
        assert_eq!(
            placeholder.outcome().await,
            Err(RequestError::Failed("refused".into()))
        );
    }

    #[tokio::test]
    async fn test_request_failure_surfaces_through_outcome() {
        let rt = runtime();
        let placeholder = Placeholder::new(Arc::clone(&rt));
        let request: RequestHandle = TaskRequest::spawn(&context(&rt), async {
            Err(RequestError::Failed("boom".into()))
        });
        placeholder.bind(request).expect("bind");

        assert_eq!(
            placeholder.outcome().await,
            Err(RequestError::Failed("boom".into()))
        );
    }
}
