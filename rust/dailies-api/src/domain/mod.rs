//! Core domain models.
//!
//! Recurrence schedules and the tracked items that reference them.

pub mod schedules;
pub mod tasks;

pub use schedules::*;
pub use tasks::*;
