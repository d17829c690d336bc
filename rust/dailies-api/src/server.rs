//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::config::{AppConfig, DatabaseBackend, DatabaseConfig};
use crate::database::create_store;
use crate::gateway;
use crate::hub::Hub;
use crate::logging::OpTimer;
use crate::scheduler::ResetScheduler;
use crate::{AppState, log_banner, log_init_step, log_init_warning, log_success};

/// Dailies API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A fully wired application.
#[derive(Debug)]
pub struct Application {
    /// Routes plus middleware, ready for `axum::serve`.
    pub router: Router,
    /// Shared state, kept for shutdown.
    pub state: AppState,
    /// The hub loop. It only ends after `HubHandle::shutdown`, so the binary
    /// treats any earlier exit as fatal.
    pub hub_task: JoinHandle<()>,
}

/// Create the store, hub, scheduler and router.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Application> {
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("Dailies API v{VERSION}"),
        format!("Listening on {}", config.server.bind_address())
    );

    // [1/4] Task store
    let step_timer = OpTimer::new("server", "task_store");
    let store = create_store(&config.database).await?;
    let store_info = match config.database.backend {
        DatabaseBackend::Memory => "in-memory".to_string(),
        DatabaseBackend::Sqlite => format!(
            "sqlite ({})",
            config
                .database
                .path
                .as_deref()
                .unwrap_or(DatabaseConfig::DEFAULT_PATH)
        ),
    };
    log_init_step!(1, 4, "Task store", store_info);
    step_timer.finish();

    // [2/4] Notification hub
    let step_timer = OpTimer::new("server", "hub");
    let (hub, hub_handle) = Hub::new(config.hub);
    let hub_task = tokio::spawn(hub.run());
    log_init_step!(
        2,
        4,
        "Notification hub",
        format!("queue capacity {}", config.hub.queue_capacity)
    );
    step_timer.finish();

    // [3/4] Reset scheduler
    let step_timer = OpTimer::new("server", "scheduler");
    let scheduler = Arc::new(
        ResetScheduler::new(Arc::clone(&store), Some(Arc::new(hub_handle.clone())))
            .with_interval(config.scheduler.tick_interval()),
    );
    if config.scheduler.enabled {
        scheduler.start().await?;
        log_init_step!(
            3,
            4,
            "Reset scheduler",
            format!("every {}s", config.scheduler.tick_interval_secs)
        );
    } else {
        log_init_warning!("Reset scheduler disabled by configuration");
        log_init_step!(3, 4, "Reset scheduler", "disabled");
    }
    step_timer.finish();

    let state = AppState {
        config: Arc::new(config),
        hub: hub_handle,
        scheduler,
        store,
    };

    // [4/4] Router
    let step_timer = OpTimer::new("server", "router");
    let router = build_router(state.clone());
    log_init_step!(4, 4, "Router", "Routes + middleware configured");
    step_timer.finish();

    overall_timer.finish();
    log_success!("Dailies API server created successfully");

    Ok(Application {
        router,
        state,
        hub_task,
    })
}

/// Stop the scheduler (letting a running tick finish), then the hub.
pub async fn shutdown(state: &AppState, hub_task: JoinHandle<()>) {
    state.scheduler.stop().await;
    state.hub.shutdown().await;
    if let Err(e) = hub_task.await {
        tracing::error!(error = %e, "Notification hub task failed");
    }
}

/// Build the router with middleware around an existing state.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .merge(api::create_router())
        .merge(gateway::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
