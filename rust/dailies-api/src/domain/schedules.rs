//! Recurrence schedule model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named recurrence rule shared by any number of tracked items.
///
/// The expression is stored verbatim. It is not validated here: an invalid
/// expression is tolerated by storage and skipped by the reset scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSchedule {
    /// Unique schedule ID.
    pub id: String,
    /// Unique human-readable name (e.g. "Daily@00:00").
    pub name: String,
    /// Five-field cron expression: minute hour day-of-month month day-of-week.
    pub expression: String,
    /// IANA timezone the expression is interpreted in; empty means UTC.
    pub timezone: String,
}

impl RecurrenceSchedule {
    /// Create a schedule with a freshly assigned ID.
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            expression: expression.into(),
            timezone: timezone.into(),
        }
    }
}
