//! Error types for the executor.

use thiserror::Error;

/// Errors that can occur when configuring or starting the executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Invalid executor configuration.
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    Runtime(#[from] std::io::Error),
}
