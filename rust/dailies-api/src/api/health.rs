//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;
use crate::hub::HubStats;
use crate::scheduler::SchedulerState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    scheduler: SchedulerState,
    /// `None` once the hub loop has stopped.
    hub: Option<HubStats>,
}

/// Service health: `degraded` when the notification hub is not running.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let hub = state.hub.stats().await.ok();

    Json(HealthResponse {
        status: if hub.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        scheduler: state.scheduler.state().await,
        hub,
    })
}
