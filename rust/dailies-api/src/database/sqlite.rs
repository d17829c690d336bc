//! SQLite task store.
//!
//! Blocking rusqlite calls run on the blocking pool; a single connection is
//! shared behind a mutex, which is plenty for one scheduler plus CRUD traffic.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use super::TaskStore;
use crate::domain::{RecurrenceSchedule, ResetCandidate, TrackedItem};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS recurrence_schedules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    expression TEXT NOT NULL,
    timezone TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS tracked_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    last_modified TEXT NOT NULL,
    schedule_id TEXT REFERENCES recurrence_schedules(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_tracked_items_resettable
    ON tracked_items(completed, schedule_id) WHERE schedule_id IS NOT NULL;
";

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            // Enable WAL mode for concurrency
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Self::init(&conn)?;
            Ok(conn)
        })
        .await
        .context("Tokio spawn_blocking failed")??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .context("Tokio spawn_blocking failed")?
    }

    /// Insert or replace a schedule. Names must be unique.
    pub async fn upsert_schedule(&self, schedule: &RecurrenceSchedule) -> Result<()> {
        let schedule = schedule.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO recurrence_schedules (id, name, expression, timezone)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   expression = excluded.expression,
                   timezone = excluded.timezone",
                params![
                    schedule.id,
                    schedule.name,
                    schedule.expression,
                    schedule.timezone
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Insert or replace an item.
    pub async fn upsert_item(&self, item: &TrackedItem) -> Result<()> {
        let item = item.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tracked_items (id, title, completed, last_modified, schedule_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   completed = excluded.completed,
                   last_modified = excluded.last_modified,
                   schedule_id = excluded.schedule_id",
                params![
                    item.id,
                    item.title,
                    item.completed,
                    format_timestamp(item.last_modified),
                    item.schedule_id
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Toggle an item's completion, bumping `last_modified`.
    pub async fn set_completed(&self, item_id: &str, completed: bool, at: DateTime<Utc>) -> Result<()> {
        let item_id = item_id.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE tracked_items SET completed = ?2, last_modified = ?3 WHERE id = ?1",
                params![item_id, completed, format_timestamp(at)],
            )?;
            if updated == 0 {
                bail!("item {item_id} not found");
            }
            Ok(())
        })
        .await
    }

    /// Fetch one item.
    pub async fn item(&self, item_id: &str) -> Result<Option<TrackedItem>> {
        let item_id = item_id.to_string();
        self.with_conn(move |conn| {
            let item = conn
                .query_row(
                    "SELECT id, title, completed, last_modified, schedule_id
                     FROM tracked_items WHERE id = ?1",
                    params![item_id],
                    item_from_row,
                )
                .optional()?;
            Ok(item)
        })
        .await
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn load_resettable_candidates(&self) -> Result<Vec<ResetCandidate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.title, i.completed, i.last_modified, i.schedule_id,
                        s.id, s.name, s.expression, s.timezone
                 FROM tracked_items i
                 JOIN recurrence_schedules s ON s.id = i.schedule_id
                 WHERE i.completed = 1 AND i.schedule_id IS NOT NULL",
            )?;
            let candidates = stmt
                .query_map([], |row| {
                    Ok(ResetCandidate {
                        item: item_from_row(row)?,
                        schedule: RecurrenceSchedule {
                            id: row.get(5)?,
                            name: row.get(6)?,
                            expression: row.get(7)?,
                            timezone: row.get(8)?,
                        },
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(candidates)
        })
        .await
    }

    async fn mark_incomplete(&self, item_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.set_completed(item_id, false, at).await
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedItem> {
    let raw: String = row.get(3)?;
    let last_modified = DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(TrackedItem {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        last_modified,
        schedule_id: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_candidates_join_schedule() {
        let store = SqliteStore::open_in_memory().unwrap();
        let schedule = RecurrenceSchedule::new("Daily@00:00", "0 0 * * *", "UTC");
        store.upsert_schedule(&schedule).await.unwrap();

        let done_at = Utc.with_ymd_and_hms(2024, 6, 1, 15, 30, 0).unwrap();
        let recurring = TrackedItem::new("stretch")
            .with_schedule(&schedule.id)
            .completed_at(done_at);
        store.upsert_item(&recurring).await.unwrap();
        store
            .upsert_item(&TrackedItem::new("open").with_schedule(&schedule.id))
            .await
            .unwrap();
        store
            .upsert_item(&TrackedItem::new("one-off").completed_at(done_at))
            .await
            .unwrap();

        let candidates = store.load_resettable_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item, recurring);
        assert_eq!(candidates[0].schedule, schedule);
    }

    #[tokio::test]
    async fn test_mark_incomplete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dailies.sqlite");
        let store = SqliteStore::open(&path).await.unwrap();

        let item = TrackedItem::new("read").completed_at(Utc::now() - Duration::days(2));
        store.upsert_item(&item).await.unwrap();

        let at = Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap();
        store.mark_incomplete(&item.id, at).await.unwrap();

        let reopened = SqliteStore::open(&path).await.unwrap();
        let stored = reopened.item(&item.id).await.unwrap().unwrap();
        assert!(!stored.completed);
        assert_eq!(stored.last_modified, at);

        assert!(reopened.mark_incomplete("missing", at).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_schedule_names() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_schedule(&RecurrenceSchedule::new("Weekly", "0 0 * * 0", ""))
            .await
            .unwrap();
        assert!(
            store
                .upsert_schedule(&RecurrenceSchedule::new("Weekly", "0 0 * * 1", ""))
                .await
                .is_err()
        );
    }
}
