//! Tokio runtime spawner implementation.

use std::sync::Arc;

use crate::core::{BoxFuture, Spawn, SpawnError, TaskHandle};

/// Tokio-based spawner that executes tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Create a new `TokioSpawner` from a tokio runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Bind to the runtime the caller is running in.
    pub fn current() -> Result<Self, SpawnError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SpawnError::Runtime(e.to_string()))
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxFuture) -> TaskHandle {
        let abort = self.handle.spawn(fut).abort_handle();
        TaskHandle::new(move || abort.abort())
    }
}
