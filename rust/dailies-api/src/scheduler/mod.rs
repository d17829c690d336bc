//! Recurrence evaluation and the periodic reset scheduler.
//!
//! - [`cron`]: five-field cron grammar and next-occurrence search
//! - [`evaluator`]: the "has the boundary passed" decision, with a parse cache
//! - [`reset`]: the driver that flips completed recurring items back

pub mod cron;
pub mod error;
pub mod evaluator;
pub mod reset;

pub use cron::{CronExpression, CronParser};
pub use error::{RecurrenceError, SchedulerError};
pub use evaluator::{DEFAULT_CACHE_CAPACITY, RecurrenceEvaluator, next_boundary, parse_timezone, should_reset};
pub use reset::{DEFAULT_TICK_INTERVAL, ResetScheduler, SchedulerState, TickReport};
