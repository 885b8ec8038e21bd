//! Retrying task executor for Cadence.
//!
//! This crate provides a small execution substrate that:
//! - Runs boolean-reporting operations on a shared tokio worker pool
//! - Retries failed operations with a pluggable backoff strategy
//! - Waits out backoff on a timer instead of holding a worker
//! - Reports success, exhaustion, or interruption through a handle

mod backoff;
mod config;
mod error;
mod executor;
mod task;

pub use backoff::{Backoff, ExponentialBackoff, LegacyBackoff, LinearBackoff};
pub use config::{BackoffConfig, ExecutorConfig};
pub use error::ExecutorError;
pub use executor::RetryExecutor;
pub use task::{RetryHandle, RetryOutcome, TaskState};
