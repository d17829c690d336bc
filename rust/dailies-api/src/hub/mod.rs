//! In-process notification hub.
//!
//! Decouples producers ("something changed") from live viewers ("someone is
//! watching") with best-effort, at-most-once delivery.
//!
//! # Architecture
//!
//! ```text
//! Scheduler ─┐                        ┌─> Subscriber queue 1 ─> Session 1
//! CRUD edit ─┼─> inbox ─> Hub::run ───┼─> Subscriber queue 2 ─> Session 2
//! Session  ──┘  (register/unregister) └─> ...
//! ```
//!
//! The subscriber set is owned by the single [`Hub::run`] loop; every
//! register, unregister and publish is a message into that loop, so the set
//! needs no lock.
//!
//! # Backpressure
//!
//! Fan-out uses `try_send` on each subscriber's bounded queue. A subscriber
//! whose queue is full is evicted on the spot: its queue is dropped, which
//! ends its session. A broadcast never waits on a slow consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! let (hub, handle) = Hub::new(HubConfig::default());
//! tokio::spawn(hub.run());
//!
//! let mut subscription = handle.register().await?;
//! handle.publish(Notification::new(NotificationKind::TaskUpdated, "edited", None)).await?;
//! let event = subscription.recv().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::events::{EventPublisher, Notification};

/// Default per-subscriber outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default capacity of the hub's own input queue.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Opaque identity of one live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hub errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub loop has exited (shutdown, or every handle was dropped).
    #[error("notification hub is not running")]
    Closed,
}

/// Hub sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of each subscriber's outbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Capacity of the hub's input queue.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

/// Counters reported by the hub loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Notifications fanned out since start.
    pub published: u64,
    /// Subscribers evicted for a full queue since start.
    pub evicted: u64,
}

type Outbound = mpsc::Sender<Arc<Notification>>;

#[derive(Debug)]
enum Command {
    Register { id: SubscriberId, queue: Outbound },
    Unregister(SubscriberId),
    Publish(Notification),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

/// The receiving end handed to a newly registered subscriber.
///
/// `recv` yields `None` once the hub has dropped this subscriber (eviction,
/// unregister, or hub shutdown).
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Notification>>,
}

impl Subscription {
    /// This subscriber's identity, used to unregister.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next notification.
    pub async fn recv(&mut self) -> Option<Arc<Notification>> {
        self.receiver.recv().await
    }

    /// Take a queued notification without waiting.
    pub fn try_recv(&mut self) -> Result<Arc<Notification>, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// The hub loop and the subscriber set it owns.
#[derive(Debug)]
pub struct Hub {
    inbox: mpsc::Receiver<Command>,
    subscribers: HashMap<SubscriberId, Outbound>,
    published: u64,
    evicted: u64,
}

/// Cloneable handle used by producers and by the connection-accept path.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
    queue_capacity: usize,
}

impl Hub {
    /// Create a hub and its first handle. Spawn [`Hub::run`] to start it.
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, inbox) = mpsc::channel(config.inbox_capacity.max(1));
        let hub = Self {
            inbox,
            subscribers: HashMap::new(),
            published: 0,
            evicted: 0,
        };
        let handle = HubHandle {
            tx,
            queue_capacity: config.queue_capacity.max(1),
        };
        (hub, handle)
    }

    /// Serially process register/unregister/publish requests.
    ///
    /// Returns after [`HubHandle::shutdown`] or once every handle is dropped;
    /// remaining subscriber queues are closed on the way out.
    pub async fn run(mut self) {
        tracing::info!("Notification hub started");

        while let Some(command) = self.inbox.recv().await {
            match command {
                Command::Register { id, queue } => {
                    self.subscribers.insert(id, queue);
                    tracing::debug!(
                        subscriber_id = %id,
                        subscribers = self.subscribers.len(),
                        "Subscriber registered"
                    );
                }
                Command::Unregister(id) => {
                    if self.subscribers.remove(&id).is_some() {
                        tracing::debug!(
                            subscriber_id = %id,
                            subscribers = self.subscribers.len(),
                            "Subscriber unregistered"
                        );
                    }
                }
                Command::Publish(notification) => self.fan_out(notification),
                Command::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
                Command::Shutdown => break,
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        tracing::info!(remaining, "Notification hub stopped");
    }

    fn fan_out(&mut self, notification: Notification) {
        let kind = notification.kind;
        let payload = Arc::new(notification);
        let mut evicted = 0u64;

        self.subscribers
            .retain(|id, queue| match queue.try_send(Arc::clone(&payload)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = %id, "Subscriber queue full, disconnecting");
                    evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %id, "Subscriber queue closed, removing");
                    false
                }
            });

        self.published += 1;
        self.evicted += evicted;
        tracing::debug!(
            ?kind,
            delivered = self.subscribers.len(),
            evicted,
            "Notification fanned out"
        );
    }

    fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscribers.len(),
            published: self.published,
            evicted: self.evicted,
        }
    }
}

impl HubHandle {
    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Closed)
    }

    /// Register a new subscriber with a bounded outbound queue.
    ///
    /// The subscriber receives every notification whose publish is processed
    /// after this registration.
    pub async fn register(&self) -> Result<Subscription, HubError> {
        let id = SubscriberId::new();
        let (queue, receiver) = mpsc::channel(self.queue_capacity);
        self.send(Command::Register { id, queue }).await?;
        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber. Unknown or already-removed IDs are ignored.
    pub async fn unregister(&self, id: SubscriberId) {
        // A stopped hub has no subscribers left to remove.
        let _ = self.send(Command::Unregister(id)).await;
    }

    /// Queue a notification for fan-out. Waits only for room in the hub's
    /// input queue, never for subscribers.
    pub async fn publish(&self, notification: Notification) -> Result<(), HubError> {
        self.send(Command::Publish(notification)).await
    }

    /// Snapshot of the hub counters.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stats(reply)).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// Ask the hub loop to stop. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.send(Command::Shutdown).await;
    }

    /// Whether the hub loop is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[async_trait]
impl EventPublisher for HubHandle {
    async fn publish(&self, notification: Notification) {
        if let Err(e) = HubHandle::publish(self, notification).await {
            tracing::warn!(error = %e, "Dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::NotificationKind;

    fn note(message: &str) -> Notification {
        Notification::new(NotificationKind::TaskUpdated, message, None)
    }

    fn spawn_hub(config: HubConfig) -> (HubHandle, tokio::task::JoinHandle<()>) {
        let (hub, handle) = Hub::new(config);
        (handle, tokio::spawn(hub.run()))
    }

    #[tokio::test]
    async fn test_publish_reaches_all_registered() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let mut a = handle.register().await.unwrap();
        let mut b = handle.register().await.unwrap();

        handle.publish(note("hello")).await.unwrap();

        assert_eq!(a.recv().await.unwrap().message, "hello");
        assert_eq!(b.recv().await.unwrap().message, "hello");
        assert_eq!(handle.stats().await.unwrap().subscribers, 2);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_publish() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let mut early = handle.register().await.unwrap();
        handle.publish(note("first")).await.unwrap();
        let mut late = handle.register().await.unwrap();
        handle.publish(note("second")).await.unwrap();

        assert_eq!(early.recv().await.unwrap().message, "first");
        assert_eq!(early.recv().await.unwrap().message, "second");
        assert_eq!(late.recv().await.unwrap().message, "second");
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let mut sub = handle.register().await.unwrap();

        handle.unregister(sub.id()).await;
        handle.unregister(sub.id()).await;

        assert_eq!(handle.stats().await.unwrap().subscribers, 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_is_evicted_without_blocking_others() {
        let (handle, _task) = spawn_hub(HubConfig {
            queue_capacity: 1,
            inbox_capacity: 16,
        });
        let mut slow = handle.register().await.unwrap();
        let mut fast = handle.register().await.unwrap();

        handle.publish(note("one")).await.unwrap();
        assert_eq!(fast.recv().await.unwrap().message, "one");

        // `slow` never drained "one", so this publish finds its queue full.
        handle.publish(note("two")).await.unwrap();
        assert_eq!(fast.recv().await.unwrap().message, "two");

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.published, 2);

        handle.publish(note("three")).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), fast.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.message, "three");

        // The evicted subscriber sees what was queued, then the end.
        assert_eq!(slow.recv().await.unwrap().message, "one");
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let sub = handle.register().await.unwrap();
        drop(sub);

        handle.publish(note("anyone?")).await.unwrap();
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.evicted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let (handle, task) = spawn_hub(HubConfig::default());
        let mut sub = handle.register().await.unwrap();

        handle.shutdown().await;
        task.await.unwrap();

        assert!(sub.recv().await.is_none());
        assert!(!handle.is_running());
        assert_eq!(handle.register().await.unwrap_err(), HubError::Closed);
        assert_eq!(handle.publish(note("late")).await, Err(HubError::Closed));
        handle.unregister(sub.id()).await;
    }

    #[tokio::test]
    async fn test_hub_stops_when_handles_dropped() {
        let (hub, handle) = Hub::new(HubConfig::default());
        let task = tokio::spawn(hub.run());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let mut joins = Vec::new();
        for _ in 0..32 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move { handle.register().await.unwrap() }));
        }
        let mut subs = Vec::new();
        for join in joins {
            subs.push(join.await.unwrap());
        }

        handle.publish(note("all")).await.unwrap();
        for sub in &mut subs {
            assert_eq!(sub.recv().await.unwrap().message, "all");
        }
    }

    #[tokio::test]
    async fn test_event_publisher_impl() {
        let (handle, _task) = spawn_hub(HubConfig::default());
        let mut sub = handle.register().await.unwrap();
        let publisher: Arc<dyn EventPublisher> = Arc::new(handle.clone());

        publisher.publish(note("via trait")).await;
        assert_eq!(sub.recv().await.unwrap().message, "via trait");
    }
}
