//! Scheduled activity reconciliation for Cadence.
//!
//! This crate provides:
//! - The activity, identifier and status types shared across the service
//! - A pure reconciliation engine that diffs freshly scheduled activities
//!   against persisted ones
//! - Store and scheduler seams, with an in-memory store
//! - A service that reconciles on every request and writes the result back
//!   through the retrying executor

mod error;
mod reconcile;
mod scheduler;
mod service;
mod store;
mod types;

pub use error::ScheduleError;
pub use reconcile::{Reconciliation, dedupe_persisted, reconcile, visible_in_order};
pub use scheduler::{ActivityScheduler, StaticScheduler};
pub use service::{ActivityUpdate, ScheduleService, ScheduleView};
pub use store::{ActivityStore, MemoryActivityStore};
pub use types::{ActivityRef, ActivityStatus, Guid, ScheduleContext, ScheduledActivity};
