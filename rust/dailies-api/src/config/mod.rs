//! Configuration management for the Dailies API.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. Config file (`config/dailies.{toml,yaml,json}`, or `--config <path>`)
//! 3. Environment variables, `DAILIES__<SECTION>__<KEY>` (a `.env` file is
//!    loaded first if present)
//!
//! # Validation
//!
//! [`AppConfig::load`] runs [`ConfigValidator`] and reports every problem at
//! once:
//!
//! ```rust,ignore
//! use dailies_api::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! ```

pub mod error;
pub mod validator;

pub use crate::hub::HubConfig;
pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAILIES";

/// Config file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/dailies";

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Reset scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Notification hub sizing.
    #[serde(default)]
    pub hub: HubConfig,
    /// WebSocket session liveness.
    #[serde(default)]
    pub session: SessionConfig,
    /// Task store backend.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration from the default file and environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Load and validate configuration, reading `file` instead of the default
    /// config file when given.
    pub fn load_from(file: Option<&str>) -> anyhow::Result<Self> {
        let config = Self::load_unchecked(file)?;

        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;

        Ok(config)
    }

    /// Load configuration without validation.
    pub fn load_unchecked(file: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let file_source = match file {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("logging.level", default_log_level())?
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP request timeout in seconds (WebSocket sessions are exempt once upgraded).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reset scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the periodic driver starts with the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl SchedulerConfig {
    /// Tick cadence.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

/// WebSocket session liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds between server Ping frames. Must be below the read timeout.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Seconds without any inbound frame before the session is dropped.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Seconds allowed for a single outbound write.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

fn default_ping_interval() -> u64 {
    54
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}

/// Task store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// In-process maps; data is lost on restart.
    #[default]
    Memory,
    /// SQLite file (requires the `sqlite` feature).
    Sqlite,
}

/// Task store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Which store to use.
    #[serde(default)]
    pub backend: DatabaseBackend,
    /// SQLite database file; defaults to [`DatabaseConfig::DEFAULT_PATH`].
    pub path: Option<String>,
}

impl DatabaseConfig {
    /// SQLite file used when no path is configured.
    pub const DEFAULT_PATH: &'static str = "data/dailies.sqlite";
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard(&'static [&'static str]);

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in self.0 {
                // SAFETY: tests touching the environment are serialized.
                unsafe { std::env::remove_var(key) };
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.session.ping_interval_secs, 54);
        assert_eq!(config.session.read_timeout_secs, 60);
        assert_eq!(config.session.write_timeout_secs, 10);
        assert_eq!(config.hub.queue_capacity, crate::hub::DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let _guard = EnvGuard(&[
            "DAILIES__SERVER__PORT",
            "DAILIES__SCHEDULER__TICK_INTERVAL_SECS",
            "DAILIES__DATABASE__BACKEND",
            "DAILIES__HUB__QUEUE_CAPACITY",
        ]);
        // SAFETY: serialized with the other env tests.
        unsafe {
            std::env::set_var("DAILIES__SERVER__PORT", "9090");
            std::env::set_var("DAILIES__SCHEDULER__TICK_INTERVAL_SECS", "5");
            std::env::set_var("DAILIES__DATABASE__BACKEND", "sqlite");
            std::env::set_var("DAILIES__HUB__QUEUE_CAPACITY", "8");
        }

        let config = AppConfig::load_unchecked(None).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.hub.queue_capacity, 8);
        assert_eq!(config.session.read_timeout_secs, 60);
    }

    #[test]
    #[serial]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dailies.toml");
        std::fs::write(
            &path,
            "[session]\nping_interval_secs = 20\nread_timeout_secs = 30\n\n[logging]\njson = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.session.ping_interval_secs, 20);
        assert_eq!(config.session.read_timeout_secs, 30);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dailies.toml");
        std::fs::write(&path, "[session]\nping_interval_secs = 90\n").unwrap();

        let err = AppConfig::load_from(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("Configuration validation failed"));
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load_unchecked(Some("/nonexistent/dailies")).is_err());
    }
}
