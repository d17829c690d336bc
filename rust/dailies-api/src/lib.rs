//! Dailies API: recurring task resets with live notifications.
//!
//! Completed "daily" tasks flip back to incomplete when their recurrence
//! boundary passes, and every connected viewer hears about it immediately.
//!
//! # Architecture
//!
//! ```text
//! ResetScheduler ──tick──> TaskStore (load candidates, mark incomplete)
//!        │
//!        └─publish──> Hub ──fan-out──> Session ──> WebSocket client
//! ```
//!
//! - [`scheduler`]: cron grammar, recurrence evaluation and the periodic driver
//! - [`hub`]: single-owner pub/sub loop with bounded per-subscriber queues
//! - [`gateway`]: WebSocket sessions and scheduler HTTP endpoints
//! - [`database`]: the [`database::TaskStore`] seam and its backends
//! - [`events`]: the notification envelope and the publisher capability
//! - [`domain`]: schedules and tracked items
//! - [`config`]: layered configuration and validation
//!
//! # Example
//!
//! ```rust,ignore
//! use dailies_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app.router).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod events;
pub mod gateway;
pub mod hub;
pub mod logging;
pub mod scheduler;
pub mod server;

use std::sync::Arc;

use config::AppConfig;
use database::TaskStore;
use hub::HubHandle;
use scheduler::ResetScheduler;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Handle to the notification hub loop.
    pub hub: HubHandle,
    /// Recurrence reset scheduler.
    pub scheduler: Arc<ResetScheduler>,
    /// Task store shared with the scheduler.
    pub store: Arc<dyn TaskStore>,
}
