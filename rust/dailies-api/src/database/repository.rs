//! Persistence seam consumed by the reset scheduler.
//!
//! The scheduler never talks to a concrete database. It needs exactly two
//! operations: load the items that may need a reset, and flip one item back
//! to incomplete. Everything else about storage belongs to the CRUD layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ResetCandidate;

/// Repository trait for the reset scheduler's reads and writes.
#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug {
    /// All items with `completed == true` and a schedule reference, each
    /// loaded together with its schedule.
    async fn load_resettable_candidates(&self) -> anyhow::Result<Vec<ResetCandidate>>;

    /// Single-row transition: `completed = false`, `last_modified = at`.
    ///
    /// Fails if the item no longer exists.
    async fn mark_incomplete(&self, item_id: &str, at: DateTime<Utc>) -> anyhow::Result<()>;
}
