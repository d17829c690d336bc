//! In-memory task store.
//!
//! Used when no database is configured and throughout the tests. Besides
//! the [`TaskStore`] seam it offers the handful of CRUD primitives the
//! outer layer needs to create and edit items and schedules.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::TaskStore;
use crate::domain::{RecurrenceSchedule, ResetCandidate, TrackedItem};

#[derive(Debug, Default)]
struct Tables {
    schedules: HashMap<String, RecurrenceSchedule>,
    items: HashMap<String, TrackedItem>,
}

/// Thread-safe in-memory store; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a schedule. Names must be unique.
    pub fn insert_schedule(&self, schedule: RecurrenceSchedule) -> anyhow::Result<()> {
        let mut tables = self.tables.write();
        if tables
            .schedules
            .values()
            .any(|existing| existing.name == schedule.name && existing.id != schedule.id)
        {
            bail!("schedule name '{}' already exists", schedule.name);
        }
        tables.schedules.insert(schedule.id.clone(), schedule);
        Ok(())
    }

    /// Replace an existing schedule.
    pub fn update_schedule(&self, schedule: RecurrenceSchedule) -> anyhow::Result<()> {
        if !self.tables.read().schedules.contains_key(&schedule.id) {
            bail!("schedule {} not found", schedule.id);
        }
        self.insert_schedule(schedule)
    }

    /// Insert or replace an item.
    pub fn insert_item(&self, item: TrackedItem) {
        self.tables.write().items.insert(item.id.clone(), item);
    }

    /// Toggle an item's completion, bumping `last_modified`.
    pub fn set_completed(
        &self,
        item_id: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write();
        let item = tables
            .items
            .get_mut(item_id)
            .with_context(|| format!("item {item_id} not found"))?;
        item.completed = completed;
        item.last_modified = at;
        Ok(())
    }

    /// Fetch one item.
    #[must_use]
    pub fn item(&self, item_id: &str) -> Option<TrackedItem> {
        self.tables.read().items.get(item_id).cloned()
    }

    /// Fetch one schedule.
    #[must_use]
    pub fn schedule(&self, schedule_id: &str) -> Option<RecurrenceSchedule> {
        self.tables.read().schedules.get(schedule_id).cloned()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn load_resettable_candidates(&self) -> anyhow::Result<Vec<ResetCandidate>> {
        let tables = self.tables.read();
        let candidates = tables
            .items
            .values()
            .filter(|item| item.is_reset_candidate())
            .filter_map(|item| {
                let schedule_id = item.schedule_id.as_deref()?;
                // Dangling references behave like an inner join: skipped.
                let schedule = tables.schedules.get(schedule_id)?;
                Some(ResetCandidate {
                    item: item.clone(),
                    schedule: schedule.clone(),
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn mark_incomplete(&self, item_id: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        self.set_completed(item_id, false, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_candidates_are_completed_and_scheduled() {
        let store = InMemoryStore::new();
        let schedule = RecurrenceSchedule::new("Daily@00:00", "0 0 * * *", "UTC");
        store.insert_schedule(schedule.clone()).unwrap();

        let now = Utc::now();
        let recurring = TrackedItem::new("recurring")
            .with_schedule(&schedule.id)
            .completed_at(now);
        store.insert_item(recurring.clone());
        store.insert_item(TrackedItem::new("open").with_schedule(&schedule.id));
        store.insert_item(TrackedItem::new("one-off").completed_at(now));
        store.insert_item(
            TrackedItem::new("dangling")
                .with_schedule("missing")
                .completed_at(now),
        );

        let candidates = store.load_resettable_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item.id, recurring.id);
        assert_eq!(candidates[0].schedule, schedule);
    }

    #[tokio::test]
    async fn test_mark_incomplete() {
        let store = InMemoryStore::new();
        let item = TrackedItem::new("x").completed_at(Utc::now());
        store.insert_item(item.clone());

        let at = Utc::now();
        store.mark_incomplete(&item.id, at).await.unwrap();
        let stored = store.item(&item.id).unwrap();
        assert!(!stored.completed);
        assert_eq!(stored.last_modified, at);

        assert!(store.mark_incomplete("nope", at).await.is_err());
    }

    #[test]
    fn test_schedule_names_unique() {
        let store = InMemoryStore::new();
        let first = RecurrenceSchedule::new("Weekly", "0 0 * * 0", "");
        store.insert_schedule(first.clone()).unwrap();
        assert!(
            store
                .insert_schedule(RecurrenceSchedule::new("Weekly", "0 0 * * 1", ""))
                .is_err()
        );

        let mut edited = first;
        edited.expression = "0 6 * * 0".to_string();
        store.update_schedule(edited.clone()).unwrap();
        assert_eq!(store.schedule(&edited.id).unwrap().expression, "0 6 * * 0");
    }
}
