//! Admission policies: when, and whether, a spawned placeholder is dispatched.
//!
//! A policy never starts work itself. It enqueues the placeholder into the shared
//! state (always, so cancellation reaches it) and calls
//! [`Dispatcher::dispatch`](super::Dispatcher::dispatch) when admission is granted,
//! now or from a timer or event.
//!
//! | Mode | Admission |
//! |---|---|
//! | `default` | dispatch immediately |
//! | `delay` | dispatch once after `delay`, unless cancelled first |
//! | `interval` | independent dispatch every `delay` until cancelled |
//! | `throttle` | open a window; dispatch when it closes; drop calls while open |
//! | `debounce` | cancel the previous tail, restart the window, dispatch the newest |
//! | `queue` | dispatch after every earlier entry finished or was cancelled, plus `delay` |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::event::{EventKind, RequestEvent};
use super::placeholder::Placeholder;
use super::spawner::{Dispatcher, Spawner, SpawnerOptions};
use super::state::{QueueTurn, SharedState};
use super::timer::{Spawn, TimerHandle};
use super::SpawnError;

/// Everything a policy may look at or act on for one `spawn` call.
pub struct PolicyContext<'a> {
    /// The spawner's scheduling state.
    pub state: &'a SharedState,
    /// The spawner running this policy, for its events and introspection.
    pub spawner: &'a Spawner,
    /// The spawner's options.
    pub options: &'a SpawnerOptions,
    /// The placeholder created for this call.
    pub placeholder: &'a Placeholder,
    /// Triggers dispatch of this placeholder; cloneable into timers and handlers.
    pub dispatcher: Dispatcher,
    /// Runtime for timers.
    pub runtime: &'a Arc<dyn Spawn>,
}

/// Admission strategy invoked once per `spawn` call.
///
/// # Example
///
/// ```rust,ignore
/// use request_spawner::core::{Policy, PolicyContext, SpawnError};
///
/// /// Admits only while fewer than `limit` placeholders are live.
/// struct Bounded { limit: usize }
///
/// impl Policy for Bounded {
///     fn admit(&self, cx: PolicyContext<'_>) -> Result<(), SpawnError> {
///         let admit = {
///             let mut state = cx.state.lock();
///             let admit = state.len() < self.limit;
///             state.enqueue(cx.placeholder.clone());
///             admit
///         };
///         if admit {
///             cx.dispatcher.dispatch()?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Policy: Send + Sync + 'static {
    /// Enqueue the placeholder and grant, defer or withhold dispatch.
    ///
    /// # Errors
    ///
    /// Misuse, such as dispatching the same placeholder twice.
    fn admit(&self, cx: PolicyContext<'_>) -> Result<(), SpawnError>;
}

struct FnPolicy<F>(F);

impl<F> Policy for FnPolicy<F>
where
    F: Fn(PolicyContext<'_>) -> Result<(), SpawnError> + Send + Sync + 'static,
{
    fn admit(&self, cx: PolicyContext<'_>) -> Result<(), SpawnError> {
        (self.0)(cx)
    }
}

/// Built-in policy selection, or a caller-supplied policy.
#[derive(Clone, Default)]
pub enum SpawnMode {
    /// Dispatch on every call.
    #[default]
    Default,
    /// Dispatch once after the delay.
    Delay,
    /// Dispatch repeatedly every delay.
    Interval,
    /// Leading-window rate limit.
    Throttle,
    /// Trailing-edge coalescing.
    Debounce,
    /// Serialized dispatch in arrival order.
    Queue,
    /// Caller-supplied policy.
    Custom(Arc<dyn Policy>),
}

impl SpawnMode {
    /// Wrap a policy object.
    pub fn custom<P: Policy>(policy: P) -> Self {
        Self::Custom(Arc::new(policy))
    }

    /// Wrap a policy closure.
    pub fn from_fn<F>(policy: F) -> Self
    where
        F: Fn(PolicyContext<'_>) -> Result<(), SpawnError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(FnPolicy(policy)))
    }

    /// Mode name as used in configuration.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Delay => "delay",
            Self::Interval => "interval",
            Self::Throttle => "throttle",
            Self::Debounce => "debounce",
            Self::Queue => "queue",
            Self::Custom(_) => "custom",
        }
    }
}

impl FromStr for SpawnMode {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "delay" => Ok(Self::Delay),
            "interval" => Ok(Self::Interval),
            "throttle" => Ok(Self::Throttle),
            "debounce" => Ok(Self::Debounce),
            "queue" => Ok(Self::Queue),
            other => Err(SpawnError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Debug for SpawnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Policy for SpawnMode {
    fn admit(&self, cx: PolicyContext<'_>) -> Result<(), SpawnError> {
        match self {
            Self::Default => admit_default(cx),
            Self::Delay => admit_delay(cx),
            Self::Interval => admit_interval(cx),
            Self::Throttle => admit_throttle(cx),
            Self::Debounce => admit_debounce(cx),
            Self::Queue => admit_queue(cx),
            Self::Custom(policy) => policy.admit(cx),
        }
    }
}

fn admit_default(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    cx.state.lock().enqueue(cx.placeholder.clone());
    cx.dispatcher.dispatch()?;
    Ok(())
}

fn admit_delay(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    cx.state.lock().enqueue(cx.placeholder.clone());
    let dispatcher = cx.dispatcher.clone();
    let timer = TimerHandle::after(&**cx.runtime, cx.options.delay, move || {
        dispatcher.dispatch_deferred();
    });
    cx.placeholder.on(EventKind::Cancel, move |_| timer.cancel());
    Ok(())
}

fn admit_interval(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    cx.state.lock().enqueue(cx.placeholder.clone());
    let dispatcher = cx.dispatcher.clone();
    let timer = TimerHandle::every(&**cx.runtime, cx.options.delay, move || {
        if let Err(err) = dispatcher.dispatch_detached() {
            tracing::error!(
                placeholder = dispatcher.placeholder().id(),
                "interval dispatch failed: {err}"
            );
        }
    });
    cx.placeholder.on(EventKind::Cancel, move |_| timer.cancel());
    Ok(())
}

fn admit_throttle(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    let expired = {
        let mut state = cx.state.lock();
        state.enqueue(cx.placeholder.clone());
        state.take_due_timer(Instant::now())
    };
    if let Some(timer) = expired {
        tracing::debug!(placeholder = cx.placeholder.id(), "closing expired throttle window");
        timer.fire_now();
    }

    let window = {
        let mut state = cx.state.lock();
        if state.is_blocked() {
            tracing::debug!(placeholder = cx.placeholder.id(), "throttled");
            return Ok(());
        }
        state.open_window()
    };
    start_window(&cx, window, cx.options.delay);
    Ok(())
}

fn admit_debounce(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    let (previous, window, wait) = {
        let mut state = cx.state.lock();
        let wait = if cx.options.leading && state.is_empty() {
            Duration::ZERO
        } else {
            cx.options.delay
        };
        let previous = state.tail().cloned();
        let window = state.open_window();
        state.enqueue(cx.placeholder.clone());
        (previous, window, wait)
    };
    if let Some(previous) = previous {
        tracing::debug!(placeholder = previous.id(), "debounced");
        drop(previous.cancel());
    }
    start_window(&cx, window, wait);
    Ok(())
}

fn start_window(cx: &PolicyContext<'_>, window: u64, wait: Duration) {
    let state = Arc::clone(cx.state);
    let dispatcher = cx.dispatcher.clone();
    let timer = TimerHandle::after(&**cx.runtime, wait, move || {
        let current = state.lock().close_window(window);
        if current {
            dispatcher.dispatch_deferred();
        }
    });
    cx.state.lock().attach_timer(window, timer);
}

fn admit_queue(cx: PolicyContext<'_>) -> Result<(), SpawnError> {
    let turn = QueueTurn::default();
    let delayed: Arc<Mutex<Option<TimerHandle>>> = Arc::default();

    let own = turn.clone();
    let on_finish = move |_: &RequestEvent| own.own_done();
    let own = turn.clone();
    let slot = Arc::clone(&delayed);
    let on_cancel = move |_: &RequestEvent| {
        let timer = slot.lock().take();
        if let Some(timer) = timer {
            timer.cancel();
        }
        own.own_done();
    };
    cx.placeholder
        .on(EventKind::Finish, on_finish)
        .on(EventKind::Cancel, on_cancel);

    let ahead = {
        let mut state = cx.state.lock();
        state.enqueue(cx.placeholder.clone());
        state.push_turn(turn.clone())
    };
    let Some(ahead) = ahead else {
        turn.ahead_done();
        cx.dispatcher.dispatch()?;
        return Ok(());
    };

    tracing::debug!(placeholder = cx.placeholder.id(), "queued behind previous entry");
    let delay = cx.options.delay;
    let runtime = Arc::clone(cx.runtime);
    let dispatcher = cx.dispatcher.clone();
    ahead.when_complete(move || {
        turn.ahead_done();
        if delay.is_zero() {
            dispatcher.dispatch_deferred();
            return;
        }
        if dispatcher.placeholder().status().is_terminal() {
            return;
        }
        let deferred = dispatcher.clone();
        let timer = TimerHandle::after(&*runtime, delay, move || deferred.dispatch_deferred());
        *delayed.lock() = Some(timer);
        if dispatcher.placeholder().status().is_terminal() {
            let timer = delayed.lock().take();
            if let Some(timer) = timer {
                timer.cancel();
            }
        }
    });
    Ok(())
}
