//! Error types for scheduling operations.

use thiserror::Error;

use crate::Guid;

/// Errors that can occur in schedule operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No persisted activity with this guid.
    #[error("activity not found: {health_code}/{guid}")]
    NotFound { health_code: String, guid: Guid },

    /// The scheduler could not produce activities.
    #[error("scheduling failed: {0}")]
    Scheduling(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}
