//! Per-spawner scheduling state.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::placeholder::Placeholder;
use super::timer::TimerHandle;
use crate::util::PlaceholderId;

/// State shared between a spawner, its policies and their timers.
pub type SharedState = Arc<Mutex<SchedulerState>>;

/// Mutable scheduling state owned by exactly one spawner.
///
/// Holds the live placeholders in arrival order and the blocking window used by
/// throttle and debounce. A blocking timer exists only while the window is open,
/// and opening a new window cancels the previous timer.
///
/// Never hold the lock while cancelling a placeholder or dispatching: both emit
/// events whose handlers lock the state again.
#[derive(Debug, Default)]
pub struct SchedulerState {
    queue: Vec<Placeholder>,
    is_blocked: bool,
    blocker_timer: Option<TimerHandle>,
    window: u64,
    is_called: bool,
    last_turn: Option<QueueTurn>,
}

impl SchedulerState {
    /// Fresh shared state.
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Live placeholders in arrival order.
    pub fn queue(&self) -> &[Placeholder] {
        &self.queue
    }

    /// Most recently enqueued live placeholder.
    pub fn tail(&self) -> Option<&Placeholder> {
        self.queue.last()
    }

    /// Number of live placeholders.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no placeholder is live.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Append a placeholder unless it already left its lifecycle.
    pub fn enqueue(&mut self, placeholder: Placeholder) {
        if placeholder.status().is_terminal() {
            return;
        }
        self.queue.push(placeholder);
    }

    /// Remove a placeholder by id. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: PlaceholderId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|placeholder| placeholder.id() != id);
        self.queue.len() != before
    }

    /// Take every live placeholder out of the queue.
    pub fn drain(&mut self) -> Vec<Placeholder> {
        std::mem::take(&mut self.queue)
    }

    /// Whether a blocking window is open.
    pub const fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    /// Whether any dispatch happened on this spawner.
    pub const fn is_called(&self) -> bool {
        self.is_called
    }

    pub(crate) fn mark_called(&mut self) {
        self.is_called = true;
    }

    /// Open a new blocking window, cancelling the previous window's timer.
    /// Returns the window token to pass to [`Self::attach_timer`] and [`Self::close_window`].
    pub fn open_window(&mut self) -> u64 {
        if let Some(timer) = self.blocker_timer.take() {
            timer.cancel();
        }
        self.window += 1;
        self.is_blocked = true;
        self.window
    }

    /// Attach the timer for `window`. A timer for a window that already closed or
    /// was superseded is cancelled instead.
    pub fn attach_timer(&mut self, window: u64, timer: TimerHandle) {
        if self.is_blocked && self.window == window {
            self.blocker_timer = Some(timer);
        } else {
            timer.cancel();
        }
    }

    /// Close `window` if it is still the current one. Returns false for a stale
    /// timer whose window was replaced.
    pub fn close_window(&mut self, window: u64) -> bool {
        if !self.is_blocked || self.window != window {
            return false;
        }
        self.is_blocked = false;
        self.blocker_timer = None;
        true
    }

    /// Take the blocking timer if its deadline passed at `now` but it has not
    /// run yet. The caller fires it outside the lock.
    pub fn take_due_timer(&mut self, now: Instant) -> Option<TimerHandle> {
        if !self.is_blocked {
            return None;
        }
        if self.blocker_timer.as_ref().is_some_and(|timer| timer.is_due(now)) {
            return self.blocker_timer.take();
        }
        None
    }

    /// Register `turn` as the newest serialized entry and return the turn it has
    /// to wait for, if that one is still open.
    pub(crate) fn push_turn(&mut self, turn: QueueTurn) -> Option<QueueTurn> {
        self.last_turn
            .replace(turn)
            .filter(|previous| !previous.is_complete())
    }

    /// Has a blocking timer attached.
    pub const fn has_timer(&self) -> bool {
        self.blocker_timer.is_some()
    }
}

type Waiter = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TurnState {
    ahead_done: bool,
    own_done: bool,
    complete: bool,
    waiters: Vec<Waiter>,
}

/// One entry's turn in serialized (`queue`) dispatch.
///
/// A turn completes once every entry ahead of it completed and the entry itself
/// finished or was cancelled. An entry cancelled while waiting therefore hands
/// its wait on to its successor instead of releasing it early.
#[derive(Clone, Default)]
pub(crate) struct QueueTurn {
    state: Arc<Mutex<TurnState>>,
}

impl QueueTurn {
    /// Every entry ahead of this one is done.
    pub(crate) fn ahead_done(&self) {
        self.update(|turn| turn.ahead_done = true);
    }

    /// The entry itself finished or was cancelled.
    pub(crate) fn own_done(&self) {
        self.update(|turn| turn.own_done = true);
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state.lock().complete
    }

    /// Run `waiter` once this turn completes, immediately if it already has.
    pub(crate) fn when_complete<F>(&self, waiter: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut turn = self.state.lock();
            if !turn.complete {
                turn.waiters.push(Box::new(waiter));
                return;
            }
        }
        waiter();
    }

    fn update(&self, apply: impl FnOnce(&mut TurnState)) {
        let waiters = {
            let mut turn = self.state.lock();
            apply(&mut turn);
            if turn.complete || !(turn.ahead_done && turn.own_done) {
                return;
            }
            turn.complete = true;
            std::mem::take(&mut turn.waiters)
        };
        for waiter in waiters {
            waiter();
        }
    }
}

impl fmt::Debug for QueueTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let turn = self.state.lock();
        f.debug_struct("QueueTurn")
            .field("ahead_done", &turn.ahead_done)
            .field("own_done", &turn.own_done)
            .field("waiters", &turn.waiters.len())
            .finish()
    }
}
