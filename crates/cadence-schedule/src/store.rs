//! Persisted activity storage.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::{Guid, ScheduleError, ScheduledActivity};

/// Storage for a participant's persisted activities.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// All persisted activities for a participant, in storage order.
    async fn get_activities(&self, health_code: &str)
    -> Result<Vec<ScheduledActivity>, ScheduleError>;

    /// One persisted activity, if present.
    async fn get_activity(
        &self,
        health_code: &str,
        guid: &Guid,
    ) -> Result<Option<ScheduledActivity>, ScheduleError>;

    /// Insert or replace activities by guid.
    async fn save_activities(&self, activities: &[ScheduledActivity]) -> Result<(), ScheduleError>;

    /// Remove activities by guid.
    ///
    /// Rows whose stored status is not retractable are kept, so a delete
    /// that lands after the participant started the activity is a no-op.
    async fn delete_activities(&self, activities: &[ScheduledActivity])
    -> Result<(), ScheduleError>;

    /// Remove everything persisted for a participant.
    async fn delete_activities_for_participant(&self, health_code: &str)
    -> Result<(), ScheduleError>;
}

/// In-memory store keyed by participant.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    activities: DashMap<String, Vec<ScheduledActivity>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load activities verbatim, without stamping `saved_on`.
    pub fn seed(&self, activities: impl IntoIterator<Item = ScheduledActivity>) {
        for activity in activities {
            self.activities
                .entry(activity.health_code.clone())
                .or_default()
                .push(activity);
        }
    }

    /// Every participant's activities, participants in health code order.
    pub fn all(&self) -> Vec<ScheduledActivity> {
        let mut participants: Vec<(String, Vec<ScheduledActivity>)> = self
            .activities
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        participants.sort_by(|a, b| a.0.cmp(&b.0));
        participants.into_iter().flat_map(|(_, list)| list).collect()
    }

    /// Number of activities held for a participant.
    pub fn len(&self, health_code: &str) -> usize {
        self.activities
            .get(health_code)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, health_code: &str) -> bool {
        self.len(health_code) == 0
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn get_activities(
        &self,
        health_code: &str,
    ) -> Result<Vec<ScheduledActivity>, ScheduleError> {
        Ok(self
            .activities
            .get(health_code)
            .map(|list| list.clone())
            .unwrap_or_default())
    }

    async fn get_activity(
        &self,
        health_code: &str,
        guid: &Guid,
    ) -> Result<Option<ScheduledActivity>, ScheduleError> {
        Ok(self
            .activities
            .get(health_code)
            .and_then(|list| list.iter().find(|a| &a.guid == guid).cloned()))
    }

    async fn save_activities(&self, activities: &[ScheduledActivity]) -> Result<(), ScheduleError> {
        let now = Utc::now();
        for activity in activities {
            let mut list = self
                .activities
                .entry(activity.health_code.clone())
                .or_default();
            let mut activity = activity.clone();

            match list.iter().position(|a| a.guid == activity.guid) {
                Some(index) => {
                    if activity.saved_on.is_none() {
                        activity.saved_on = list[index].saved_on.or(Some(now));
                    }
                    list[index] = activity;
                }
                None => {
                    activity.saved_on.get_or_insert(now);
                    list.push(activity);
                }
            }
        }
        debug!(count = activities.len(), "saved activities");
        Ok(())
    }

    async fn delete_activities(
        &self,
        activities: &[ScheduledActivity],
    ) -> Result<(), ScheduleError> {
        for activity in activities {
            if let Some(mut list) = self.activities.get_mut(&activity.health_code) {
                list.retain(|a| a.guid != activity.guid || !a.status.is_retractable());
            }
        }
        debug!(count = activities.len(), "deleted activities");
        Ok(())
    }

    async fn delete_activities_for_participant(
        &self,
        health_code: &str,
    ) -> Result<(), ScheduleError> {
        self.activities.remove(health_code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActivityRef, ActivityStatus};
    use chrono::TimeZone;

    fn activity(guid: &str, health_code: &str) -> ScheduledActivity {
        ScheduledActivity::new(
            guid,
            health_code,
            ActivityRef::new(guid, "Tapping test"),
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_save_stamps_saved_on_once() {
        let store = MemoryActivityStore::new();
        store.save_activities(&[activity("a", "hc-1")]).await.unwrap();

        let first = store
            .get_activity("hc-1", &Guid::from("a"))
            .await
            .unwrap()
            .unwrap();
        let stamped = first.saved_on.expect("save should stamp saved_on");

        let mut update = activity("a", "hc-1").with_status(ActivityStatus::Started);
        update.saved_on = None;
        store.save_activities(&[update]).await.unwrap();

        let second = store
            .get_activity("hc-1", &Guid::from("a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.saved_on, Some(stamped));
        assert_eq!(second.status, ActivityStatus::Started);
        assert_eq!(store.len("hc-1"), 1);
    }

    #[tokio::test]
    async fn test_participants_are_isolated() {
        let store = MemoryActivityStore::new();
        store.seed([activity("a", "hc-1"), activity("a", "hc-2")]);

        store.delete_activities(&[activity("a", "hc-1")]).await.unwrap();

        assert!(store.is_empty("hc-1"));
        assert_eq!(store.len("hc-2"), 1);
    }

    #[tokio::test]
    async fn test_seed_keeps_order_and_fields() {
        let store = MemoryActivityStore::new();
        store.seed([activity("b", "hc-1"), activity("a", "hc-1")]);

        let activities = store.get_activities("hc-1").await.unwrap();
        let guids: Vec<_> = activities.iter().map(|a| a.guid.as_str()).collect();
        assert_eq!(guids, vec!["b", "a"]);
        assert!(activities.iter().all(|a| a.saved_on.is_none()));
    }

    #[tokio::test]
    async fn test_delete_skips_started_rows() {
        let store = MemoryActivityStore::new();
        let mut started = activity("a", "hc-1");
        started.start(Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap());
        store.seed([started.clone(), activity("b", "hc-1")]);

        store
            .delete_activities(&[activity("a", "hc-1"), activity("b", "hc-1")])
            .await
            .unwrap();

        assert_eq!(store.get_activities("hc-1").await.unwrap(), vec![started]);
    }

    #[tokio::test]
    async fn test_all_spans_participants() {
        let store = MemoryActivityStore::new();
        store.seed([activity("z", "hc-2"), activity("a", "hc-1"), activity("b", "hc-1")]);

        let all = store.all();
        let keys: Vec<_> = all
            .iter()
            .map(|a| format!("{}/{}", a.health_code, a.guid))
            .collect();
        assert_eq!(keys, vec!["hc-1/a", "hc-1/b", "hc-2/z"]);
    }

    #[tokio::test]
    async fn test_delete_for_participant() {
        let store = MemoryActivityStore::new();
        store.seed([activity("a", "hc-1"), activity("b", "hc-1")]);

        store.delete_activities_for_participant("hc-1").await.unwrap();

        assert!(store.get_activities("hc-1").await.unwrap().is_empty());
    }
}
