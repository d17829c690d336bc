//! Gateway functionality: live notification streaming and scheduler endpoints.
//!
//! - WebSocket accept path and per-connection sessions
//! - Recurrence preview and manual scheduler tick
//! - API info

pub mod routes;
pub mod schedules;
pub mod session;
pub mod streaming;

use axum::Router;

use crate::AppState;

/// Create the gateway router with all gateway-specific routes.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(routes::router())
        .merge(schedules::router())
        .merge(streaming::router())
}
