//! Recurrence evaluation: has an item's recurring boundary been crossed?
//!
//! The boundary is the first scheduled instant strictly after the item's
//! `last_modified` timestamp. Because a reset itself bumps `last_modified`
//! to the tick's `now`, evaluating a freshly reset item again yields `false`
//! until the next boundary.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;

use super::{CronExpression, CronParser, RecurrenceError};

/// Resolve an IANA timezone name; an empty name means UTC.
pub fn parse_timezone(name: &str) -> Result<Tz, RecurrenceError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| RecurrenceError::UnknownTimezone(name.to_string()))
}

/// First boundary of `expression` (interpreted in `timezone`) strictly after `last_modified`.
pub fn next_boundary(
    expression: &str,
    timezone: &str,
    last_modified: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    let cron = CronParser::parse(expression)?;
    let tz = parse_timezone(timezone)?;
    boundary_after(&cron, tz, expression, last_modified)
}

/// Decide whether an item completed at `last_modified` should be reset at `now`.
///
/// Returns `Ok(true)` iff the next boundary after `last_modified` is `<= now`.
pub fn should_reset(
    expression: &str,
    timezone: &str,
    last_modified: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool, RecurrenceError> {
    Ok(next_boundary(expression, timezone, last_modified)? <= now)
}

fn boundary_after(
    cron: &CronExpression,
    tz: Tz,
    expression: &str,
    last_modified: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    cron.next_after(&last_modified.with_timezone(&tz))
        .map(|boundary| boundary.with_timezone(&Utc))
        .ok_or_else(|| RecurrenceError::NoUpcomingOccurrence(expression.to_string()))
}

/// Upper bound on distinct cached expressions.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Evaluator that caches parsed expressions keyed by the raw expression string.
///
/// Only successfully parsed expressions are cached, so an invalid schedule
/// is re-parsed (and reported) on every tick until it is fixed. When the cache
/// is full it is emptied before the next insert; expressions orphaned by
/// schedule edits are dropped that way.
#[derive(Debug)]
pub struct RecurrenceEvaluator {
    cache: RwLock<HashMap<String, Arc<CronExpression>>>,
    capacity: usize,
}

impl Default for RecurrenceEvaluator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl RecurrenceEvaluator {
    /// Create an evaluator with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator caching at most `capacity` expressions.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Cached equivalent of [`should_reset`].
    pub fn should_reset(
        &self,
        expression: &str,
        timezone: &str,
        last_modified: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RecurrenceError> {
        let cron = self.parsed(expression)?;
        let tz = parse_timezone(timezone)?;
        Ok(boundary_after(&cron, tz, expression, last_modified)? <= now)
    }

    fn parsed(&self, expression: &str) -> Result<Arc<CronExpression>, RecurrenceError> {
        if let Some(cron) = self.cache.read().get(expression) {
            return Ok(Arc::clone(cron));
        }

        let cron = Arc::new(CronParser::parse(expression)?);
        let mut cache = self.cache.write();
        if cache.len() >= self.capacity && !cache.contains_key(expression) {
            tracing::debug!(cached = cache.len(), "Recurrence cache full, clearing");
            cache.clear();
        }
        cache.insert(expression.to_string(), Arc::clone(&cron));
        Ok(cron)
    }

    /// Drop the cached parse of an expression, e.g. after its schedule was edited.
    pub fn invalidate(&self, expression: &str) {
        self.cache.write().remove(expression);
    }

    /// Drop every cached parse.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Number of cached expressions.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}
