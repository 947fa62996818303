//! Task-backed active request used by [`FnExecutor`](super::FnExecutor).

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use super::event::{EventBus, RequestEvent};
use super::executor::{ActiveRequest, ExecutionContext};
use super::timer::TaskHandle;
use super::RequestError;

type Settled = Option<Result<Value, RequestError>>;

/// A request running as a task on the spawner's runtime.
///
/// Settles exactly once: either the task completes and emits `done`/`fail`
/// followed by `finish`, or [`ActiveRequest::cancel`] wins and emits `cancel`.
pub struct TaskRequest {
    events: EventBus,
    result: watch::Sender<Settled>,
    task: Mutex<Option<TaskHandle>>,
}

impl TaskRequest {
    /// Start `work` on the context's runtime, bounded by the context timeout.
    pub fn spawn<Fut>(cx: &ExecutionContext, work: Fut) -> Arc<Self>
    where
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let (result, _) = watch::channel(None);
        let request = Arc::new(Self {
            events: EventBus::new(),
            result,
            task: Mutex::new(None),
        });

        let timeout = cx.timeout;
        let runner = Arc::clone(&request);
        let handle = cx.runtime.spawn(Box::pin(async move {
            let result = if timeout.is_zero() {
                work.await
            } else {
                tokio::time::timeout(timeout, work)
                    .await
                    .unwrap_or(Err(RequestError::Timeout(timeout)))
            };
            runner.complete(result);
        }));
        *request.task.lock() = Some(handle);
        request
    }

    fn complete(&self, result: Result<Value, RequestError>) {
        let event = match &result {
            Ok(value) => RequestEvent::Done(value.clone()),
            Err(err) => RequestEvent::Fail(err.clone()),
        };
        if !self.settle(result) {
            return;
        }
        self.events.emit(&event);
        self.events.emit(&RequestEvent::Finish);
    }

    fn settle(&self, result: Result<Value, RequestError>) -> bool {
        self.result.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        })
    }
}

#[async_trait]
impl ActiveRequest for TaskRequest {
    fn events(&self) -> &EventBus {
        &self.events
    }

    async fn cancel(&self) -> Result<(), RequestError> {
        if !self.settle(Err(RequestError::Cancelled)) {
            return Ok(());
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        tracing::debug!("task request cancelled");
        self.events.emit(&RequestEvent::Cancel);
        Ok(())
    }

    async fn outcome(&self) -> Result<Value, RequestError> {
        let mut rx = self.result.subscribe();
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RequestError::Aborted)?;
        settled.clone().unwrap_or(Err(RequestError::Aborted))
    }

    fn settled(&self) -> Option<Result<Value, RequestError>> {
        self.result.borrow().clone()
    }
}
