//! Runtime abstraction and cancelable timers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Boxed future accepted by [`Spawn`].
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a future and return a handle that can abort it.
    fn spawn(&self, fut: BoxFuture) -> TaskHandle;
}

/// Handle to a spawned task. Aborting is idempotent.
pub struct TaskHandle {
    abort: Option<Box<dyn Fn() + Send + Sync>>,
}

impl TaskHandle {
    /// Wrap an abort function.
    pub fn new<F>(abort: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            abort: Some(Box::new(abort)),
        }
    }

    /// A handle for work that cannot be aborted.
    pub const fn detached() -> Self {
        Self { abort: None }
    }

    /// Abort the task if the runtime supports it.
    pub fn abort(&self) {
        if let Some(abort) = &self.abort {
            abort();
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("abortable", &self.abort.is_some())
            .finish()
    }
}

type Callback = Box<dyn FnOnce() + Send>;

/// Cancelable one-shot or repeating timer.
///
/// A callback never starts after [`TimerHandle::cancel`] has returned, even if the
/// sleep had already elapsed and the task was about to run it. A one-shot callback
/// runs at most once, whether the sleep or [`TimerHandle::fire_now`] gets to it first.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    due: Arc<Mutex<Option<Callback>>>,
    deadline: Instant,
    task: TaskHandle,
}

impl TimerHandle {
    /// Run `callback` once after `delay`.
    pub fn after<F>(runtime: &dyn Spawn, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let due: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(Some(Box::new(callback))));
        let deadline = Instant::now() + delay;
        let slot = Arc::clone(&due);
        let task = runtime.spawn(Box::pin(async move {
            tokio::time::sleep_until(deadline).await;
            let callback = slot.lock().take();
            if let Some(callback) = callback {
                callback();
            }
        }));
        Self {
            cancelled,
            due,
            deadline,
            task,
        }
    }

    /// Run `callback` every `period`, first after one full period.
    ///
    /// A zero period is clamped to one millisecond.
    pub fn every<F>(runtime: &dyn Spawn, period: Duration, callback: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let deadline = Instant::now() + period;
        let task = runtime.spawn(Box::pin(async move {
            let mut ticker = tokio::time::interval_at(deadline, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                callback();
            }
        }));
        Self {
            cancelled,
            due: Arc::new(Mutex::new(None)),
            deadline,
            task,
        }
    }

    /// When a one-shot timer is due, or when a repeating timer first ticks.
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the deadline has been reached at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline <= now
    }

    /// Run a one-shot callback on the calling task instead of waiting for the
    /// sleep. No-op for repeating, cancelled or already fired timers.
    pub fn fire_now(&self) {
        let callback = self.due.lock().take();
        if let Some(callback) = callback {
            self.task.abort();
            callback();
        }
    }

    /// Stop the timer. Safe to call repeatedly and after it fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let callback = self.due.lock().take();
        drop(callback);
        self.task.abort();
    }

    /// Whether [`TimerHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
