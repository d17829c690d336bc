//! WebSocket entry point for live notifications.

use axum::{
    Router,
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};

use super::session::{SessionTimeouts, run_session};
use crate::AppState;

/// Streaming routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(websocket_handler))
}

/// Upgrade the connection, then register it with the hub.
///
/// # Endpoint
///
/// `GET /ws`
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: AppState) {
    let subscription = match state.hub.register().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting WebSocket connection");
            let _ = socket.close().await;
            return;
        }
    };

    let (writer, reader) = socket.split();
    run_session(
        writer,
        reader,
        subscription,
        state.hub.clone(),
        SessionTimeouts::from(&state.config.session),
    )
    .await;
}
