//! Tracked item (task) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecurrenceSchedule;

/// A task that may flip back to incomplete on its schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Unique item ID.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Completion flag.
    pub completed: bool,
    /// Timestamp of the last mutation, including scheduler resets.
    pub last_modified: DateTime<Utc>,
    /// Recurrence schedule reference, if the item recurs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
}

impl TrackedItem {
    /// Create an incomplete, non-recurring item with a freshly assigned ID.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            completed: false,
            last_modified: Utc::now(),
            schedule_id: None,
        }
    }

    /// Attach a recurrence schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    /// Mark the item completed as of `at`.
    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed = true;
        self.last_modified = at;
        self
    }

    /// Whether the reset scheduler should consider this item at all.
    pub fn is_reset_candidate(&self) -> bool {
        self.completed && self.schedule_id.is_some()
    }
}

/// A completed, recurring item loaded together with its schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCandidate {
    /// The item to evaluate.
    pub item: TrackedItem,
    /// The schedule the item references.
    pub schedule: RecurrenceSchedule,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_distinct_ids() {
        let a = TrackedItem::new("Water plants");
        let b = TrackedItem::new("Water plants");
        assert_ne!(a.id, b.id);
        assert!(!a.completed);
    }

    #[test]
    fn test_reset_candidate_requires_completion_and_schedule() {
        let now = Utc::now();
        assert!(!TrackedItem::new("a").is_reset_candidate());
        assert!(!TrackedItem::new("b").completed_at(now).is_reset_candidate());
        assert!(!TrackedItem::new("c").with_schedule("s").is_reset_candidate());
        assert!(
            TrackedItem::new("d")
                .with_schedule("s")
                .completed_at(now)
                .is_reset_candidate()
        );
    }
}
