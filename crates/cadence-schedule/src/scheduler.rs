//! The seam to the scheduling policy.

use crate::{ActivityStatus, ScheduleContext, ScheduleError, ScheduledActivity};

/// Produces the candidate activities for a participant.
///
/// Which activities a plan generates is up to the implementation; the
/// service only reconciles whatever comes back.
pub trait ActivityScheduler: Send + Sync {
    fn schedule(&self, context: &ScheduleContext) -> Result<Vec<ScheduledActivity>, ScheduleError>;
}

impl<F> ActivityScheduler for F
where
    F: Fn(&ScheduleContext) -> Result<Vec<ScheduledActivity>, ScheduleError> + Send + Sync,
{
    fn schedule(&self, context: &ScheduleContext) -> Result<Vec<ScheduledActivity>, ScheduleError> {
        self(context)
    }
}

/// Returns the same activities for every request, assigned to the
/// requesting participant. Activities whose `expires_on` has passed at
/// `context.now` come back as `Expired`.
#[derive(Debug, Clone, Default)]
pub struct StaticScheduler {
    activities: Vec<ScheduledActivity>,
}

impl StaticScheduler {
    pub fn new(activities: Vec<ScheduledActivity>) -> Self {
        Self { activities }
    }
}

impl ActivityScheduler for StaticScheduler {
    fn schedule(&self, context: &ScheduleContext) -> Result<Vec<ScheduledActivity>, ScheduleError> {
        Ok(self
            .activities
            .iter()
            .cloned()
            .map(|mut activity| {
                activity.health_code = context.health_code.clone();
                if activity.expires_on.is_some_and(|expires| expires <= context.now) {
                    activity.status = ActivityStatus::Expired;
                }
                activity
            })
            .collect())
    }
}
