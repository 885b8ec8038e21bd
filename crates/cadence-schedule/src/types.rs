//! Scheduled activity types.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one scheduled occurrence. The only key used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    /// Occurrence guid in `<activity guid>:<local date-time>` form.
    pub fn for_occurrence(activity_guid: &str, scheduled_on: NaiveDateTime) -> Self {
        Self(format!(
            "{}:{}",
            activity_guid,
            scheduled_on.format("%Y-%m-%dT%H:%M:%S%.3f")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(guid: &str) -> Self {
        Self(guid.to_string())
    }
}

impl From<String> for Guid {
    fn from(guid: String) -> Self {
        Self(guid)
    }
}

impl Borrow<str> for Guid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Status of a scheduled activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[default]
    Scheduled,
    /// The participant has begun the activity. Never retracted.
    Started,
    Finished,
    Expired,
    Deleted,
}

impl ActivityStatus {
    /// Statuses shown to participants.
    pub const VISIBLE: [ActivityStatus; 2] = [Self::Scheduled, Self::Started];

    pub fn is_visible(self) -> bool {
        Self::VISIBLE.contains(&self)
    }

    /// Whether a persisted activity in this status may be deleted once the
    /// scheduler stops producing it.
    pub fn is_retractable(self) -> bool {
        self != Self::Started
    }
}

/// Reference to the task behind a scheduled activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRef {
    pub guid: String,
    pub label: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl ActivityRef {
    pub fn new(guid: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            label: label.into(),
            task_id: None,
        }
    }
}

/// One occurrence of an activity assigned to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledActivity {
    pub guid: Guid,
    /// Participant the activity belongs to.
    pub health_code: String,
    #[serde(default)]
    pub schedule_plan_guid: Option<String>,
    #[serde(default)]
    pub status: ActivityStatus,
    pub activity: ActivityRef,
    pub scheduled_on: DateTime<Utc>,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_on: Option<DateTime<Utc>>,
    /// Set by the store the first time the activity is written.
    #[serde(default)]
    pub saved_on: Option<DateTime<Utc>>,
}

impl ScheduledActivity {
    pub fn new(
        guid: impl Into<Guid>,
        health_code: impl Into<String>,
        activity: ActivityRef,
        scheduled_on: DateTime<Utc>,
    ) -> Self {
        Self {
            guid: guid.into(),
            health_code: health_code.into(),
            schedule_plan_guid: None,
            status: ActivityStatus::Scheduled,
            activity,
            scheduled_on,
            expires_on: None,
            started_on: None,
            finished_on: None,
            saved_on: None,
        }
    }

    pub fn with_status(mut self, status: ActivityStatus) -> Self {
        self.status = status;
        self
    }

    /// Record that the participant started the activity.
    pub fn start(&mut self, at: DateTime<Utc>) {
        self.started_on = Some(at);
        if self.status != ActivityStatus::Finished {
            self.status = ActivityStatus::Started;
        }
    }

    /// Record that the participant finished the activity.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_on = Some(at);
        self.status = ActivityStatus::Finished;
    }
}

/// Input handed to the scheduler for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleContext {
    pub health_code: String,
    pub now: DateTime<Utc>,
}

impl ScheduleContext {
    pub fn new(health_code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            health_code: health_code.into(),
            now,
        }
    }
}
