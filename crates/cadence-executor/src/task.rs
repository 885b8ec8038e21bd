//! Retry task state and the caller-facing handle.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::Backoff;

/// Boxed future returned by a wrapped operation.
pub(crate) type OperationFuture = Pin<Box<dyn Future<Output = Result<bool, String>> + Send>>;

/// Type alias for a wrapped operation.
pub(crate) type Operation = Arc<dyn Fn() -> OperationFuture + Send + Sync>;

/// Lifecycle of a retry task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, not yet picked up by a worker.
    #[default]
    Pending,
    /// The operation is executing.
    Running { attempt: u32 },
    /// Failed; waiting out the backoff before running again.
    AwaitingRetry { attempt: u32, delay: Duration },
    /// The operation reported success.
    Succeeded { attempts: u32 },
    /// Failed more times than allowed. Terminal.
    Abandoned { attempts: u32 },
    /// Shut down while waiting to retry. Terminal.
    Interrupted { attempts: u32 },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Abandoned { .. } | Self::Interrupted { .. }
        )
    }
}

/// Final result of a retry task, as observed through [`RetryHandle::outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
    Interrupted { attempts: u32 },
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// A deferred unit of work that re-enters the pool until it settles.
pub(crate) struct RetryTask {
    pub(crate) id: u64,
    /// Failed attempts so far.
    pub(crate) attempt: u32,
    pub(crate) max_attempts: u32,
    pub(crate) operation: Operation,
    pub(crate) backoff: Arc<dyn Backoff>,
    pub(crate) shutdown: Option<watch::Receiver<bool>>,
    pub(crate) state: watch::Sender<TaskState>,
}

impl RetryTask {
    /// Run one attempt on the pool, resubmitting this same task on failure.
    ///
    /// The explicit boxed return type lets the task respawn itself.
    pub(crate) fn run(mut self, pool: Handle) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let run_number = self.attempt + 1;
            self.state.send_replace(TaskState::Running {
                attempt: run_number,
            });
            debug!(task_id = self.id, attempt = run_number, "running task");

            let succeeded = match AssertUnwindSafe((self.operation)()).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!(task_id = self.id, error = %e, "task operation returned an error");
                    false
                }
                Err(_) => {
                    error!(task_id = self.id, "task operation panicked");
                    false
                }
            };

            if succeeded {
                info!(task_id = self.id, attempts = run_number, "task succeeded");
                self.state.send_replace(TaskState::Succeeded {
                    attempts: run_number,
                });
                return;
            }

            self.attempt += 1;
            if self.attempt > self.max_attempts {
                error!(
                    task_id = self.id,
                    attempts = self.attempt,
                    max_attempts = self.max_attempts,
                    "task failed too many times, giving up"
                );
                self.state.send_replace(TaskState::Abandoned {
                    attempts: self.attempt,
                });
                return;
            }

            let delay = self.backoff.delay(self.attempt);
            warn!(
                task_id = self.id,
                attempt = self.attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "task failed, retrying"
            );
            self.state.send_replace(TaskState::AwaitingRetry {
                attempt: self.attempt,
                delay,
            });

            let interrupted = match self.shutdown.as_mut() {
                Some(shutdown) => {
                    tokio::select! {
                        _ = shutdown_requested(shutdown) => true,
                        _ = sleep(delay) => false,
                    }
                }
                None => {
                    sleep(delay).await;
                    false
                }
            };

            if interrupted {
                info!(task_id = self.id, attempts = self.attempt, "shutdown during backoff, not resubmitting");
                self.state.send_replace(TaskState::Interrupted {
                    attempts: self.attempt,
                });
                return;
            }

            let next = pool.clone();
            pool.spawn(self.run(next));
        })
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Caller-side view of a submitted task.
#[derive(Debug, Clone)]
pub struct RetryHandle {
    id: u64,
    state: watch::Receiver<TaskState>,
}

impl RetryHandle {
    pub(crate) fn new(id: u64, state: watch::Receiver<TaskState>) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state of the task.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Wait for the task to settle.
    ///
    /// If the task is dropped before settling (for example the pool was shut
    /// down), this reports [`RetryOutcome::Interrupted`].
    pub async fn outcome(mut self) -> RetryOutcome {
        let settled = self
            .state
            .wait_for(TaskState::is_terminal)
            .await
            .map(|state| state.clone());

        match settled {
            Ok(TaskState::Succeeded { attempts }) => RetryOutcome::Succeeded { attempts },
            Ok(TaskState::Abandoned { attempts }) => RetryOutcome::Exhausted { attempts },
            Ok(TaskState::Interrupted { attempts }) => RetryOutcome::Interrupted { attempts },
            Ok(_) | Err(_) => {
                let attempts = match *self.state.borrow() {
                    TaskState::Running { attempt } => attempt.saturating_sub(1),
                    TaskState::AwaitingRetry { attempt, .. } => attempt,
                    _ => 0,
                };
                RetryOutcome::Interrupted { attempts }
            }
        }
    }

    /// Resolve when the task succeeds.
    ///
    /// Abandoned and interrupted tasks never resolve this future. Prefer
    /// [`RetryHandle::outcome`] unless the caller bounds the wait itself.
    pub async fn completed(mut self) {
        let succeeded = self
            .state
            .wait_for(|state| matches!(state, TaskState::Succeeded { .. }))
            .await
            .is_ok();

        if !succeeded {
            std::future::pending::<()>().await;
        }
    }
}
