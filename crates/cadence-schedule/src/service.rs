//! Schedule service: reconcile on read, write back through the executor.

use std::sync::Arc;

use cadence_executor::{RetryExecutor, RetryHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    ActivityScheduler, ActivityStore, Guid, ScheduleContext, ScheduleError, ScheduledActivity,
    dedupe_persisted, reconcile, visible_in_order,
};

/// What a participant sees, plus the writes still converging in the background.
#[derive(Debug)]
pub struct ScheduleView {
    /// Visible activities ordered by scheduled time.
    pub activities: Vec<ScheduledActivity>,
    /// One handle per dispatched save or delete batch.
    pub writes: Vec<RetryHandle>,
}

/// A participant's progress report for one activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    #[serde(default)]
    pub guid: Option<Guid>,
    #[serde(default)]
    pub started_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_on: Option<DateTime<Utc>>,
}

/// Reconciles scheduled activities against storage on every request.
pub struct ScheduleService {
    scheduler: Arc<dyn ActivityScheduler>,
    store: Arc<dyn ActivityStore>,
    executor: RetryExecutor,
    max_attempts: u32,
}

impl ScheduleService {
    /// Create a new service. Writes are retried up to `max_attempts` times.
    pub fn new(
        scheduler: Arc<dyn ActivityScheduler>,
        store: Arc<dyn ActivityStore>,
        executor: RetryExecutor,
        max_attempts: u32,
    ) -> Self {
        Self {
            scheduler,
            store,
            executor,
            max_attempts,
        }
    }

    /// Schedule, reconcile with storage, and return the client view.
    ///
    /// Saves and deletes are dispatched to the executor and are not awaited;
    /// the returned view is already the reconciled truth.
    #[tracing::instrument(skip(self), fields(health_code = %context.health_code))]
    pub async fn get_scheduled_activities(
        &self,
        context: &ScheduleContext,
    ) -> Result<ScheduleView, ScheduleError> {
        require_health_code(&context.health_code)?;

        let scheduled = self.scheduler.schedule(context)?;
        let persisted = dedupe_persisted(self.store.get_activities(&context.health_code).await?);
        let plan = reconcile(&scheduled, &persisted);

        info!(
            scheduled = scheduled.len(),
            persisted = persisted.len(),
            saves = plan.saves.len(),
            deletes = plan.deletes.len(),
            results = plan.results.len(),
            "reconciled activities"
        );

        let mut writes = Vec::with_capacity(2);
        if !plan.saves.is_empty() {
            writes.push(self.dispatch_saves(plan.saves));
        }
        if !plan.deletes.is_empty() {
            writes.push(self.dispatch_deletes(plan.deletes));
        }

        Ok(ScheduleView {
            activities: visible_in_order(plan.results),
            writes,
        })
    }

    /// Apply participant progress reports to persisted activities.
    ///
    /// Updates carrying neither timestamp are ignored. Returns the activities
    /// that were written.
    #[tracing::instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn update_scheduled_activities(
        &self,
        health_code: &str,
        updates: &[ActivityUpdate],
    ) -> Result<Vec<ScheduledActivity>, ScheduleError> {
        require_health_code(health_code)?;

        let mut to_save = Vec::with_capacity(updates.len());
        for (index, update) in updates.iter().enumerate() {
            let guid = update.guid.as_ref().ok_or_else(|| {
                ScheduleError::InvalidRequest(format!("activity #{index} has no guid"))
            })?;
            if update.started_on.is_none() && update.finished_on.is_none() {
                continue;
            }

            let mut activity = self
                .store
                .get_activity(health_code, guid)
                .await?
                .ok_or_else(|| ScheduleError::NotFound {
                    health_code: health_code.to_string(),
                    guid: guid.clone(),
                })?;

            if let Some(started_on) = update.started_on {
                activity.start(started_on);
            }
            if let Some(finished_on) = update.finished_on {
                activity.finish(finished_on);
            }
            to_save.push(activity);
        }

        if !to_save.is_empty() {
            self.store.save_activities(&to_save).await?;
        }
        debug!(saved = to_save.len(), "applied activity updates");
        Ok(to_save)
    }

    /// Remove every persisted activity for a participant.
    pub async fn delete_activities_for_participant(
        &self,
        health_code: &str,
    ) -> Result<(), ScheduleError> {
        require_health_code(health_code)?;
        self.store
            .delete_activities_for_participant(health_code)
            .await?;
        info!(health_code, "deleted all activities for participant");
        Ok(())
    }

    fn dispatch_saves(&self, saves: Vec<ScheduledActivity>) -> RetryHandle {
        let store = Arc::clone(&self.store);
        let batch = Arc::new(saves);
        self.executor.submit(
            move || {
                let store = Arc::clone(&store);
                let batch = Arc::clone(&batch);
                async move { store.save_activities(&batch).await.map(|()| true) }
            },
            self.max_attempts,
        )
    }

    fn dispatch_deletes(&self, deletes: Vec<ScheduledActivity>) -> RetryHandle {
        let store = Arc::clone(&self.store);
        let batch = Arc::new(deletes);
        self.executor.submit(
            move || {
                let store = Arc::clone(&store);
                let batch = Arc::clone(&batch);
                async move { store.delete_activities(&batch).await.map(|()| true) }
            },
            self.max_attempts,
        )
    }
}

fn require_health_code(health_code: &str) -> Result<(), ScheduleError> {
    if health_code.trim().is_empty() {
        return Err(ScheduleError::InvalidRequest(
            "health code is required".to_string(),
        ));
    }
    Ok(())
}
