//! End-to-end WebSocket tests against a real listener.
//!
//! This test validates:
//! - `connected` greeting on accept
//! - one aggregate `task_reset` per tick, delivered to every viewer
//! - application-level ping/pong
//! - unregistering when a viewer disconnects

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use dailies_api::AppState;
use dailies_api::config::AppConfig;
use dailies_api::database::{InMemoryStore, TaskStore};
use dailies_api::domain::{RecurrenceSchedule, TrackedItem};
use dailies_api::events::{Notification, NotificationKind};
use dailies_api::hub::{Hub, HubConfig};
use dailies_api::scheduler::ResetScheduler;
use dailies_api::server::build_router;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to serve the full router on an ephemeral port.
async fn spawn_server() -> Result<(SocketAddr, InMemoryStore, AppState), Box<dyn std::error::Error>>
{
    let store = InMemoryStore::new();
    let (hub, handle) = Hub::new(HubConfig::default());
    tokio::spawn(hub.run());

    let task_store: Arc<dyn TaskStore> = Arc::new(store.clone());
    let state = AppState {
        config: Arc::new(AppConfig::default()),
        scheduler: Arc::new(ResetScheduler::new(
            Arc::clone(&task_store),
            Some(Arc::new(handle.clone())),
        )),
        hub: handle,
        store: task_store,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, router).await });

    Ok((addr, store, state))
}

/// Helper to connect and consume the greeting.
async fn connect(addr: SocketAddr) -> Result<Client, Box<dyn std::error::Error>> {
    let (mut ws, _response) = connect_async(format!("ws://{addr}/ws")).await?;
    let greeting = next_json(&mut ws).await?;
    assert_eq!(greeting["type"], "connected");
    Ok(ws)
}

/// Helper to read the next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Client) -> Result<Value, Box<dyn std::error::Error>> {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await?
            .ok_or("connection closed")??;
        if let Message::Text(text) = message {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

/// Helper to wait until the hub reports the expected subscriber count.
async fn wait_for_subscribers(state: &AppState, expected: usize) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..50 {
        if state.hub.stats().await?.subscribers == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(format!("hub never reached {expected} subscribers").into())
}

fn seed_daily(store: &InMemoryStore, titles: &[&str]) -> Vec<String> {
    let schedule = RecurrenceSchedule::new("Daily@00:00", "0 0 * * *", "UTC");
    store.insert_schedule(schedule.clone()).unwrap();

    let two_days_ago = Utc::now() - chrono::Duration::days(2);
    titles
        .iter()
        .map(|title| {
            let item = TrackedItem::new(*title)
                .with_schedule(&schedule.id)
                .completed_at(two_days_ago);
            let id = item.id.clone();
            store.insert_item(item);
            id
        })
        .collect()
}

#[tokio::test]
async fn test_tick_broadcasts_one_reset_event() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, store, state) = spawn_server().await?;
    let mut first = connect(addr).await?;
    let mut second = connect(addr).await?;
    wait_for_subscribers(&state, 2).await?;

    let mut ids = seed_daily(&store, &["Water plants", "Journal"]);
    let report = state.scheduler.tick().await?;
    assert_eq!(report.reset, 2);

    for ws in [&mut first, &mut second] {
        let event = next_json(ws).await?;
        assert_eq!(event["type"], "task_reset");
        assert_eq!(event["data"]["reset_count"], 2);
        assert_eq!(event["data"]["schedule_names"][0], "Daily@00:00");

        let mut received: Vec<String> = serde_json::from_value(event["data"]["item_ids"].clone())?;
        received.sort();
        ids.sort();
        assert_eq!(received, ids);
    }

    // Exactly one event per tick: the next frame is our own ping's reply.
    first.send(Message::text(r#"{"type":"ping"}"#)).await?;
    assert_eq!(next_json(&mut first).await?["type"], "pong");

    for id in &ids {
        assert!(!store.item(id).unwrap().completed);
    }
    Ok(())
}

#[tokio::test]
async fn test_ping_pong() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, _store, _state) = spawn_server().await?;
    let mut ws = connect(addr).await?;

    ws.send(Message::text(r#"{"type":"ping"}"#)).await?;
    let pong = next_json(&mut ws).await?;
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    Ok(())
}

#[tokio::test]
async fn test_disconnect_unregisters() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, _store, state) = spawn_server().await?;
    let mut staying = connect(addr).await?;
    let mut leaving = connect(addr).await?;
    wait_for_subscribers(&state, 2).await?;

    leaving.close(None).await?;
    drop(leaving);
    wait_for_subscribers(&state, 1).await?;

    // The remaining viewer still gets events.
    state
        .hub
        .publish(Notification::new(NotificationKind::TagCreated, "Tag added", None))
        .await?;
    let event = next_json(&mut staying).await?;
    assert_eq!(event["type"], "tag_created");
    Ok(())
}
