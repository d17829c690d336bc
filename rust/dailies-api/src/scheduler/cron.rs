//! Cron expression parsing and evaluation.
//!
//! This module provides a cron parser for recurrence schedules.
//! Supports standard cron format: `minute hour day month weekday`, evaluated
//! in any timezone implementing [`chrono::TimeZone`].

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};

use super::RecurrenceError;

/// How far ahead `next_after` searches before giving up.
///
/// Eight years covers a February 29th schedule across a skipped century leap year.
const SEARCH_HORIZON_DAYS: i64 = 8 * 366;

/// Longest DST gap we step over when a local time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    /// Minute (0-59).
    minute: CronField,
    /// Hour (0-23).
    hour: CronField,
    /// Day of month (1-31).
    day: CronField,
    /// Month (1-12).
    month: CronField,
    /// Day of week (0-6, Sunday = 0).
    weekday: CronField,
}

/// A single field in a cron expression, stored as a bitset of allowed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CronField {
    bits: u64,
    /// The field started with `*`, which matters for day-of-month/day-of-week matching.
    star: bool,
}

impl CronField {
    /// Check if the field matches the given value.
    fn matches(self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }

    fn values(self, min: u32, max: u32) -> impl Iterator<Item = u32> {
        (min..=max).filter(move |v| self.matches(*v))
    }
}

/// Bounds and symbolic names for one position of the expression.
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`.
    names_start: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    names_start: 0,
};

const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    names_start: 0,
};

const DAY: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    names_start: 0,
};

const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &[
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ],
    names_start: 1,
};

// 7 is accepted as Sunday and folded onto 0 after parsing.
const WEEKDAY: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
    names_start: 0,
};

impl FieldSpec {
    fn value(&self, token: &str) -> Result<u32, String> {
        if let Ok(value) = token.parse::<u32>() {
            if value < self.min || value > self.max {
                return Err(format!(
                    "{} value {value} out of range {}-{}",
                    self.name, self.min, self.max
                ));
            }
            return Ok(value);
        }

        self.names
            .iter()
            .zip(self.names_start..)
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, value)| value)
            .ok_or_else(|| format!("invalid {} value '{token}'", self.name))
    }
}

/// Cron expression parser.
#[derive(Debug)]
pub struct CronParser;

impl CronParser {
    /// Parse a cron expression string.
    ///
    /// # Format
    ///
    /// Standard cron format: `minute hour day month weekday`. Each field
    /// accepts `*`, single values, ranges (`a-b`), steps (`*/n`, `a-b/n`,
    /// `a/n`) and comma-separated lists of those. Months and weekdays also
    /// accept three-letter names.
    ///
    /// # Examples
    ///
    /// - `0 0 * * *` - Daily at midnight
    /// - `*/5 * * * *` - Every 5 minutes
    /// - `0 9-17 * * MON-FRI` - Every hour 9am-5pm, Monday-Friday
    /// - `@weekly` - Sundays at midnight
    pub fn parse(expr: &str) -> Result<CronExpression, RecurrenceError> {
        let trimmed = expr.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            descriptor if descriptor.starts_with('@') => {
                return Err(RecurrenceError::invalid(
                    expr,
                    format!("unknown descriptor '{trimmed}'"),
                ));
            }
            _ => trimmed,
        };

        let parts: Vec<&str> = expanded.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(RecurrenceError::invalid(
                expr,
                format!("expected 5 fields, found {}", parts.len()),
            ));
        }

        let field = |raw: &str, spec: &FieldSpec| {
            Self::parse_field(raw, spec).map_err(|reason| RecurrenceError::invalid(expr, reason))
        };

        let mut weekday = field(parts[4], &WEEKDAY)?;
        if weekday.matches(7) {
            weekday.bits = (weekday.bits & !(1u64 << 7)) | 1;
        }

        Ok(CronExpression {
            minute: field(parts[0], &MINUTE)?,
            hour: field(parts[1], &HOUR)?,
            day: field(parts[2], &DAY)?,
            month: field(parts[3], &MONTH)?,
            weekday,
        })
    }

    fn parse_field(field: &str, spec: &FieldSpec) -> Result<CronField, String> {
        let mut bits = 0u64;

        for part in field.split(',') {
            if part.is_empty() {
                return Err(format!("empty element in {} field '{field}'", spec.name));
            }

            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|e| format!("invalid step '{step}' in {} field: {e}", spec.name))?;
                    if step == 0 {
                        return Err(format!("step must be positive in {} field", spec.name));
                    }
                    if step > spec.max - spec.min {
                        return Err(format!(
                            "step {step} exceeds the {} field range {}-{}",
                            spec.name, spec.min, spec.max
                        ));
                    }
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (spec.min, spec.max)
            } else if let Some((start, end)) = range.split_once('-') {
                (spec.value(start)?, spec.value(end)?)
            } else {
                let value = spec.value(range)?;
                // `a/n` runs from `a` to the end of the field.
                if step.is_some() { (value, spec.max) } else { (value, value) }
            };

            if start > end {
                return Err(format!(
                    "range {start}-{end} is reversed in {} field",
                    spec.name
                ));
            }

            let step = step.unwrap_or(1);
            let mut value = start;
            while value <= end {
                bits |= 1u64 << value;
                value += step;
            }
        }

        Ok(CronField {
            bits,
            star: field.starts_with('*'),
        })
    }
}

impl CronExpression {
    /// Check if the cron expression matches the given time (in its own timezone).
    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        let local = time.naive_local();
        self.minute.matches(local.minute())
            && self.hour.matches(local.hour())
            && self.month.matches(local.month())
            && self.day_matches(local.date())
    }

    /// Classic cron rule: when both day fields are restricted either may match.
    fn day_matches(&self, date: NaiveDate) -> bool {
        let by_month_day = self.day.matches(date.day());
        let by_weekday = self.weekday.matches(date.weekday().num_days_from_sunday());
        if self.day.star || self.weekday.star {
            by_month_day && by_weekday
        } else {
            by_month_day || by_weekday
        }
    }

    /// Calculate the first scheduled instant strictly after the given time.
    ///
    /// The search walks local calendar days in the timezone of `after`, so
    /// wall-clock schedules follow DST changes. Local times skipped by a DST
    /// gap fire at the first instant after the gap; repeated local times fire
    /// on their earliest occurrence only.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(Duration::minutes(1))?;
        let start_date = start.date();
        let last_date = start_date.checked_add_signed(Duration::days(SEARCH_HORIZON_DAYS))?;

        let mut date = start_date;
        while date <= last_date {
            if self.month.matches(date.month()) && self.day_matches(date) {
                let first_day = date == start_date;
                for hour in self.hour.values(0, 23) {
                    if first_day && hour < start.hour() {
                        continue;
                    }
                    for minute in self.minute.values(0, 59) {
                        if first_day && hour == start.hour() && minute < start.minute() {
                            continue;
                        }
                        let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
                            continue;
                        };
                        if let Some(candidate) = resolve_local(&tz, naive) {
                            if candidate > *after {
                                return Some(candidate);
                            }
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }

    /// List the next `count` scheduled instants after the given time.
    pub fn upcoming<Tz: TimeZone>(&self, after: &DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
        let mut boundaries = Vec::with_capacity(count);
        let mut cursor = after.clone();
        while boundaries.len() < count {
            let Some(next) = self.next_after(&cursor) else {
                break;
            };
            cursor = next.clone();
            boundaries.push(next);
        }
        boundaries
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|offset| {
            tz.from_local_datetime(&(naive + Duration::minutes(offset)))
                .earliest()
        }),
    }
}
