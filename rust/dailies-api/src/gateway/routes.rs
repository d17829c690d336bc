//! API info route.

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::AppState;

/// Gateway-specific routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/info", get(get_api_info))
}

/// API info response.
#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: &'static str,
    pub method: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("/ws", "GET", "Live notifications over WebSocket"),
    ("/health", "GET", "Service, scheduler and hub status"),
    (
        "/api/v1/schedules/preview",
        "GET",
        "Upcoming boundaries of a recurrence expression",
    ),
    ("/api/v1/scheduler/tick", "POST", "Run one reset tick now"),
];

/// Get API information.
pub async fn get_api_info() -> impl IntoResponse {
    let info = ApiInfo {
        name: "Dailies API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Recurring task reset scheduler with live WebSocket notifications",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(path, method, description)| EndpointInfo {
                path,
                method,
                description,
            })
            .collect(),
    };

    (StatusCode::OK, Json(info))
}
