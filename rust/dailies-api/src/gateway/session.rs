//! Per-connection subscriber session.
//!
//! A session bridges one hub [`Subscription`] to one WebSocket. It runs two
//! flows joined with `tokio::select!`:
//!
//! - **outbound**: writes hub events as JSON text, answers client pings and
//!   sends a Ping frame every `ping_interval`
//! - **inbound**: reads frames only to prove the client is alive; any frame
//!   resets the read deadline
//!
//! Whichever flow ends first ends the session. Teardown then unregisters from
//! the hub and closes the transport, each exactly once.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::events::{Notification, NotificationKind};
use crate::hub::{HubHandle, Subscription};

/// Liveness deadlines for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
    /// Maximum silence from the client.
    pub read_timeout: Duration,
    /// Maximum time for a single write.
    pub write_timeout: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionTimeouts {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent Close or the stream ended.
    ClientClosed,
    /// Reading from the transport failed.
    ReadError,
    /// Nothing was received within the read timeout.
    ReadTimeout,
    /// A write failed or exceeded the write timeout.
    WriteFailed,
    /// The hub closed our queue (slow consumer, or hub shutdown).
    Evicted,
}

impl SessionEnd {
    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::ReadError => "read_error",
            Self::ReadTimeout => "read_timeout",
            Self::WriteFailed => "write_failed",
            Self::Evicted => "evicted",
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct ClientCommand {
    #[serde(rename = "type")]
    kind: String,
}

fn is_ping(text: &str) -> bool {
    serde_json::from_str::<ClientCommand>(text).is_ok_and(|cmd| cmd.kind == "ping")
}

fn text_message(notification: &Notification) -> Option<Message> {
    match notification.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(kind = ?notification.kind, error = %e, "Failed to serialize notification");
            None
        }
    }
}

/// Run a session until either side gives up.
///
/// `writer` and `reader` are the two halves of the transport (for a real
/// socket, the result of `WebSocket::split`).
pub async fn run_session<W, R, E>(
    mut writer: W,
    reader: R,
    mut subscription: Subscription,
    hub: HubHandle,
    timeouts: SessionTimeouts,
) -> SessionEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let subscriber_id = subscription.id();
    tracing::info!(subscriber_id = %subscriber_id, "Session started");

    let greeting = Notification::new(
        NotificationKind::Connected,
        "Connected to live updates",
        Some(serde_json::json!({ "subscriber_id": subscriber_id })),
    );

    let greeted = match text_message(&greeting) {
        Some(message) => write(&mut writer, message, timeouts.write_timeout).await,
        None => Ok(()),
    };

    let end = match greeted {
        Err(end) => end,
        Ok(()) => {
            let (replies_tx, replies_rx) = mpsc::channel(8);
            tokio::select! {
                end = outbound(&mut writer, &mut subscription, replies_rx, timeouts) => end,
                end = inbound(reader, replies_tx, timeouts.read_timeout) => end,
            }
        }
    };

    hub.unregister(subscriber_id).await;
    if let Ok(Err(e)) = tokio::time::timeout(timeouts.write_timeout, writer.close()).await {
        tracing::debug!(subscriber_id = %subscriber_id, error = %e, "Error closing transport");
    }

    tracing::info!(subscriber_id = %subscriber_id, reason = %end, "Session ended");
    end
}

async fn write<W>(writer: &mut W, message: Message, write_timeout: Duration) -> Result<(), SessionEnd>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match tokio::time::timeout(write_timeout, writer.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Write failed");
            Err(SessionEnd::WriteFailed)
        }
        Err(_) => {
            tracing::debug!(timeout_secs = write_timeout.as_secs_f64(), "Write timed out");
            Err(SessionEnd::WriteFailed)
        }
    }
}

async fn outbound<W>(
    writer: &mut W,
    subscription: &mut Subscription,
    mut replies: mpsc::Receiver<Message>,
    timeouts: SessionTimeouts,
) -> SessionEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let mut ping = tokio::time::interval_at(
        Instant::now() + timeouts.ping_interval,
        timeouts.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    return SessionEnd::Evicted;
                };
                match text_message(&event) {
                    Some(message) => message,
                    None => continue,
                }
            }
            Some(reply) = replies.recv() => reply,
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        if let Err(end) = write(writer, message, timeouts.write_timeout).await {
            return end;
        }
    }
}

async fn inbound<R, E>(
    mut reader: R,
    replies: mpsc::Sender<Message>,
    read_timeout: Duration,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let frame = match tokio::time::timeout(read_timeout, reader.next()).await {
            Err(_) => return SessionEnd::ReadTimeout,
            Ok(None) => return SessionEnd::ClientClosed,
            Ok(Some(Err(e))) => {
                tracing::debug!(error = %e, "Read failed");
                return SessionEnd::ReadError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Close(_) => return SessionEnd::ClientClosed,
            Message::Text(text) if is_ping(text.as_str()) => {
                let pong = Notification::new(NotificationKind::Pong, "pong", None);
                if let Some(message) = text_message(&pong) {
                    // A client flooding pings only loses replies.
                    if replies.try_send(message).is_err() {
                        tracing::debug!("Pong reply dropped");
                    }
                }
            }
            _ => {}
        }
    }
}
