//! Reconciliation of scheduled activities against persisted ones.
//!
//! The engine is a pure function: it never touches storage, it only sorts
//! records into what must be saved, what must be deleted, and what the
//! client should see.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::ScheduledActivity;

/// The outcome of reconciling one participant's activities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Newly scheduled activities that are not yet persisted.
    pub saves: Vec<ScheduledActivity>,
    /// Persisted activities that are no longer scheduled and not started.
    pub deletes: Vec<ScheduledActivity>,
    /// One activity per guid: persisted copies first, then new ones.
    pub results: Vec<ScheduledActivity>,
}

impl Reconciliation {
    /// True when storage already matches the schedule.
    pub fn is_noop(&self) -> bool {
        self.saves.is_empty() && self.deletes.is_empty()
    }
}

/// Reconcile freshly `scheduled` activities with the `persisted` set.
///
/// Guids must be unique within each list; duplicates are not collapsed here
/// (see [`dedupe_persisted`]).
pub fn reconcile(
    scheduled: &[ScheduledActivity],
    persisted: &[ScheduledActivity],
) -> Reconciliation {
    let scheduled_guids: HashSet<&str> = scheduled.iter().map(|a| a.guid.as_str()).collect();
    let persisted_guids: HashSet<&str> = persisted.iter().map(|a| a.guid.as_str()).collect();

    let mut plan = Reconciliation {
        saves: Vec::new(),
        deletes: Vec::new(),
        results: Vec::with_capacity(scheduled.len().max(persisted.len())),
    };

    for activity in persisted {
        if scheduled_guids.contains(activity.guid.as_str()) || !activity.status.is_retractable() {
            plan.results.push(activity.clone());
        } else {
            plan.deletes.push(activity.clone());
        }
    }

    for activity in scheduled {
        if !persisted_guids.contains(activity.guid.as_str()) {
            plan.saves.push(activity.clone());
            plan.results.push(activity.clone());
        }
    }

    plan
}

/// Collapse persisted rows that share a guid.
///
/// The first row seen wins unless a later duplicate has been started and
/// the kept one has not. First-seen order is preserved.
pub fn dedupe_persisted(persisted: Vec<ScheduledActivity>) -> Vec<ScheduledActivity> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(persisted.len());
    let mut unique: Vec<ScheduledActivity> = Vec::with_capacity(persisted.len());

    for activity in persisted {
        match positions.get(activity.guid.as_str()).copied() {
            Some(index) => {
                let kept = &mut unique[index];
                if kept.started_on.is_none() && activity.started_on.is_some() {
                    *kept = activity;
                }
            }
            None => {
                positions.insert(activity.guid.as_str().to_string(), unique.len());
                unique.push(activity);
            }
        }
    }

    unique
}

/// The client view: visible activities ordered by scheduled time.
///
/// The sort is stable, so activities scheduled at the same instant keep
/// their reconciliation order.
pub fn visible_in_order(results: Vec<ScheduledActivity>) -> Vec<ScheduledActivity> {
    let mut visible: Vec<ScheduledActivity> = results
        .into_iter()
        .filter(|a| a.status.is_visible())
        .collect();
    visible.sort_by_key(|a| a.scheduled_on);
    visible
}
