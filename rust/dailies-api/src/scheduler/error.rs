//! Error types for recurrence evaluation and the reset scheduler.

use thiserror::Error;

/// Errors produced while parsing or evaluating a recurrence schedule.
///
/// None of these are fatal to the scheduler: an item whose schedule fails to
/// evaluate is skipped for the current tick and retried on the next one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The expression does not follow the five-field cron grammar.
    #[error("invalid recurrence expression '{expression}': {reason}")]
    InvalidExpression {
        /// Raw expression as stored on the schedule.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The timezone is not a known IANA zone name.
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// The expression is well formed but never fires inside the search horizon.
    #[error("recurrence expression '{0}' has no upcoming occurrence")]
    NoUpcomingOccurrence(String),
}

impl RecurrenceError {
    pub(crate) fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the reset scheduler lifecycle and tick.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` was called while the periodic driver is already running.
    #[error("reset scheduler is already running")]
    AlreadyRunning,

    /// Loading the candidate set failed; the current tick was aborted.
    #[error("failed to load reset candidates: {0}")]
    LoadCandidates(#[source] anyhow::Error),
}
