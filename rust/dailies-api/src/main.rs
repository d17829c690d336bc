//! Dailies API - Main Entry Point
//!
//! Serves the WebSocket notification endpoint and scheduler routes, and runs
//! the recurrence reset scheduler in the background.

use std::future::IntoFuture;

use anyhow::anyhow;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dailies_api::config::{AppConfig, LoggingConfig};
use dailies_api::server::{Application, create_app, shutdown};

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments. Flags override the config file and `DAILIES__*`.
#[derive(Parser, Debug)]
#[command(name = "dailies-api")]
#[command(about = "Dailies API - recurring task resets with live notifications")]
#[command(version)]
struct Args {
    /// Host to bind to.
    #[arg(long, env = "DAILIES_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "DAILIES_PORT")]
    port: Option<u16>,

    /// Log level (ignored when RUST_LOG is set).
    #[arg(long, env = "DAILIES_LOG_LEVEL")]
    log_level: Option<String>,

    /// Config file path.
    #[arg(short, long, env = "DAILIES_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_from(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Dailies API v{}", env!("CARGO_PKG_VERSION"));

    let addr = config.server.bind_address();
    let app = create_app(config).await?;
    let Application {
        router,
        state,
        mut hub_task,
    } = app;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => result?,
        joined = &mut hub_task => {
            state.scheduler.stop().await;
            return Err(match joined {
                Ok(()) => anyhow!("notification hub stopped unexpectedly"),
                Err(e) => anyhow!("notification hub failed: {e}"),
            });
        }
    }

    shutdown(&state, hub_task).await;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Initialize tracing/logging.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (plain, json) = if logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
