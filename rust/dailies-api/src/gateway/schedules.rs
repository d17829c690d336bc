//! Recurrence schedule and scheduler endpoints.
//!
//! - `GET /api/v1/schedules/preview`: upcoming boundaries of an expression
//! - `POST /api/v1/scheduler/tick`: run one reset tick now

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::scheduler::{CronParser, RecurrenceError, parse_timezone};

/// Default number of boundaries returned by the preview.
const DEFAULT_PREVIEW_COUNT: usize = 5;

/// Upper bound on `count`.
const MAX_PREVIEW_COUNT: usize = 20;

/// Schedule routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/schedules/preview", get(preview_schedule))
        .route("/api/v1/scheduler/tick", post(run_tick))
}

/// Query parameters for the preview.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Five-field cron expression or `@` descriptor.
    pub expression: String,
    /// IANA timezone; empty or absent means UTC.
    #[serde(default)]
    pub timezone: String,
    /// Number of boundaries to list (capped at 20).
    pub count: Option<usize>,
    /// List boundaries strictly after this instant instead of now.
    pub after: Option<DateTime<Utc>>,
}

/// Preview response.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// Expression as given.
    pub expression: String,
    /// Resolved timezone name.
    pub timezone: String,
    /// Upcoming boundaries in the schedule's local time, RFC 3339.
    pub occurrences: Vec<String>,
}

/// List the next boundaries of a recurrence expression.
///
/// # Endpoint
///
/// `GET /api/v1/schedules/preview?expression=0 0 * * *&timezone=Europe/Paris&count=3`
pub async fn preview_schedule(
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bad_request = |e: RecurrenceError| (StatusCode::BAD_REQUEST, e.to_string());

    let cron = CronParser::parse(&query.expression).map_err(bad_request)?;
    let tz = parse_timezone(&query.timezone).map_err(bad_request)?;
    let count = query
        .count
        .unwrap_or(DEFAULT_PREVIEW_COUNT)
        .clamp(1, MAX_PREVIEW_COUNT);
    let after = query.after.unwrap_or_else(Utc::now).with_timezone(&tz);

    let occurrences = cron.upcoming(&after, count);
    if occurrences.is_empty() {
        return Err(bad_request(RecurrenceError::NoUpcomingOccurrence(
            query.expression,
        )));
    }

    Ok(Json(PreviewResponse {
        timezone: tz.name().to_string(),
        occurrences: occurrences.iter().map(DateTime::to_rfc3339).collect(),
        expression: query.expression,
    }))
}

/// Run one reset tick immediately and return its report.
///
/// # Endpoint
///
/// `POST /api/v1/scheduler/tick`
pub async fn run_tick(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = state
        .scheduler
        .tick()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(report))
}
