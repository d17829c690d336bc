//! Notification event model.
//!
//! Every message pushed to live viewers uses one JSON envelope:
//!
//! ```json
//! {"type": "task_reset", "message": "...", "data": {...}, "timestamp": "2024-06-02T00:00:00Z"}
//! ```
//!
//! The reset scheduler emits `task_reset`; the other kinds exist so that any
//! mutation source (manual edits, CRUD handlers) can reuse the same envelope.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Notification types carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// One or more recurring tasks were flipped back to incomplete.
    TaskReset,
    /// A task was created.
    TaskCreated,
    /// A task was edited or toggled.
    TaskUpdated,
    /// A task was deleted.
    TaskDeleted,
    /// A tag was created.
    TagCreated,
    /// A tag was edited.
    TagUpdated,
    /// A tag was deleted.
    TagDeleted,
    /// A recurrence schedule was created.
    ScheduleCreated,
    /// A recurrence schedule was edited.
    ScheduleUpdated,
    /// A recurrence schedule was deleted.
    ScheduleDeleted,
    /// Session greeting sent right after the connection is accepted.
    Connected,
    /// Reply to an application-level ping.
    Pong,
}

/// The wire envelope delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Human-readable summary.
    pub message: String,
    /// Structured payload, `null` when there is none.
    pub data: Option<serde_json::Value>,
    /// Creation time, serialized as RFC 3339.
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
}

fn rfc3339<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl Notification {
    /// Build a notification stamped with the current time.
    pub fn new(
        kind: NotificationKind,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Aggregate notification for one scheduler tick.
    pub fn task_reset(event: &ResetEvent) -> Self {
        let noun = if event.reset_count == 1 { "task" } else { "tasks" };
        Self {
            kind: NotificationKind::TaskReset,
            message: format!("Reset {} recurring {noun}", event.reset_count),
            data: serde_json::to_value(event).ok(),
            timestamp: event.occurred_at,
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Payload of a `task_reset` notification: every reset made in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetEvent {
    /// IDs of the items flipped back to incomplete.
    pub item_ids: Vec<String>,
    /// Distinct schedule names involved, sorted.
    pub schedule_names: Vec<String>,
    /// Number of items reset.
    pub reset_count: usize,
    /// The tick's `now` snapshot.
    pub occurred_at: DateTime<Utc>,
}

/// The narrow capability producers need: fire-and-forget publishing.
///
/// Implemented by the notification hub handle and by [`NoopPublisher`].
#[async_trait]
pub trait EventPublisher: Send + Sync + std::fmt::Debug {
    /// Hand a notification to the broker. Never waits for subscribers.
    async fn publish(&self, notification: Notification);
}

/// Publisher that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, notification: Notification) {
        tracing::trace!(kind = ?notification.kind, "Dropping notification (no publisher)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_envelope_shape() {
        let mut notification = Notification::new(NotificationKind::TaskUpdated, "Task edited", None);
        notification.timestamp = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();

        let value: serde_json::Value = serde_json::from_str(&notification.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "task_updated");
        assert_eq!(value["message"], "Task edited");
        assert!(value["data"].is_null());
        assert_eq!(value["timestamp"], "2024-06-02T00:00:00Z");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_task_reset_carries_event() {
        let event = ResetEvent {
            item_ids: vec!["a".into(), "b".into()],
            schedule_names: vec!["Daily@00:00".into()],
            reset_count: 2,
            occurred_at: Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap(),
        };
        let notification = Notification::task_reset(&event);

        assert_eq!(notification.kind, NotificationKind::TaskReset);
        assert_eq!(notification.message, "Reset 2 recurring tasks");
        assert_eq!(notification.timestamp, event.occurred_at);

        let data = notification.data.unwrap();
        assert_eq!(data["reset_count"], 2);
        assert_eq!(data["item_ids"][1], "b");
    }

    #[test]
    fn test_envelope_round_trips_from_client_side() {
        let json = r#"{"type":"tag_deleted","message":"Tag removed","data":{"id":"t1"},"timestamp":"2024-06-02T00:00:00Z"}"#;
        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind, NotificationKind::TagDeleted);
        assert_eq!(notification.data.unwrap()["id"], "t1");
    }
}
