//! The retrying executor.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::task::{Operation, OperationFuture, RetryTask};
use crate::{Backoff, LinearBackoff, RetryHandle, TaskState};

/// Submits boolean-reporting operations to a worker pool and retries them.
///
/// Cloning is cheap; clones share the pool, backoff and task id sequence.
#[derive(Clone)]
pub struct RetryExecutor {
    pool: Handle,
    backoff: Arc<dyn Backoff>,
    shutdown: Option<watch::Receiver<bool>>,
    next_id: Arc<AtomicU64>,
}

impl RetryExecutor {
    /// Create an executor that runs tasks on the given pool with linear backoff.
    pub fn new(pool: Handle) -> Self {
        Self {
            pool,
            backoff: Arc::new(LinearBackoff::default()),
            shutdown: None,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace the backoff strategy.
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Same as [`RetryExecutor::with_backoff`] for an already shared strategy.
    pub fn with_shared_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Stop retrying once `shutdown` flips to `true`.
    ///
    /// Tasks waiting out a backoff are interrupted and not resubmitted.
    /// Attempts already running are left to finish.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Submit an operation, retrying it up to `max_attempts` times after
    /// the first failure.
    ///
    /// `Ok(false)`, `Err(_)` and a panic all count as a failed attempt.
    pub fn submit<F, Fut, E>(&self, operation: F, max_attempts: u32) -> RetryHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let operation: Operation = Arc::new(move || -> OperationFuture {
            let fut = operation();
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state, state_rx) = watch::channel(TaskState::Pending);
        let task = RetryTask {
            id,
            attempt: 0,
            max_attempts,
            operation,
            backoff: Arc::clone(&self.backoff),
            shutdown: self.shutdown.clone(),
            state,
        };

        debug!(task_id = id, max_attempts, "submitting task");
        self.pool.spawn(task.run(self.pool.clone()));

        RetryHandle::new(id, state_rx)
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("has_shutdown", &self.shutdown.is_some())
            .finish_non_exhaustive()
    }
}
