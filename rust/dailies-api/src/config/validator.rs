//! Configuration validation for the Dailies API.
//!
//! Checks run at startup so that a bad cadence or an impossible liveness
//! combination is rejected with a fix hint instead of surfacing as a
//! misbehaving session later.

use super::error::{ConfigResult, ConfigurationError};
use super::{AppConfig, DatabaseBackend, DatabaseConfig, SessionConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Configuration validator.
///
/// | Rule | Setting(s) |
/// |------|------------|
/// | tick interval > 0 | `scheduler.tick_interval_secs` |
/// | queue capacities > 0 | `hub.queue_capacity`, `hub.inbox_capacity` |
/// | all timeouts > 0 | `session.*`, `server.timeout_secs` |
/// | ping interval < read timeout | `session.ping_interval_secs`, `session.read_timeout_secs` |
/// | sqlite needs the feature and a non-empty path | `database.backend`, `database.path` |
/// | known log level | `logging.level` |
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire application configuration.
    ///
    /// Returns `Ok(())` if valid, or a `ConfigurationError` with all issues.
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if config.scheduler.tick_interval_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "scheduler.tick_interval_secs must be greater than zero",
                "Set DAILIES__SCHEDULER__TICK_INTERVAL_SECS to a positive number of seconds, e.g. 60",
            ));
        }

        if config.server.timeout_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "server.timeout_secs must be greater than zero",
                "Set DAILIES__SERVER__TIMEOUT_SECS to a positive number of seconds, e.g. 30",
            ));
        }

        if config.hub.queue_capacity == 0 {
            errors.push(ConfigurationError::invalid(
                "hub.queue_capacity must be greater than zero",
                "Set DAILIES__HUB__QUEUE_CAPACITY to a positive number, e.g. 256",
            ));
        }

        if config.hub.inbox_capacity == 0 {
            errors.push(ConfigurationError::invalid(
                "hub.inbox_capacity must be greater than zero",
                "Set DAILIES__HUB__INBOX_CAPACITY to a positive number, e.g. 1024",
            ));
        }

        if let Err(e) = Self::validate_session(&config.session) {
            Self::collect(&mut errors, e);
        }

        if let Err(e) = Self::validate_database(&config.database) {
            errors.push(e);
        }

        if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(ConfigurationError::invalid(
                format!("logging.level has invalid value '{}'", config.logging.level),
                "Set DAILIES__LOGGING__LEVEL to one of: trace, debug, info, warn, error, off",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::multiple(errors))
        }
    }

    /// Validate WebSocket liveness settings.
    pub fn validate_session(session: &SessionConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("ping_interval_secs", session.ping_interval_secs),
            ("read_timeout_secs", session.read_timeout_secs),
            ("write_timeout_secs", session.write_timeout_secs),
        ] {
            if value == 0 {
                errors.push(ConfigurationError::invalid(
                    format!("session.{name} must be greater than zero"),
                    format!(
                        "Set DAILIES__SESSION__{} to a positive number of seconds",
                        name.to_ascii_uppercase()
                    ),
                ));
            }
        }

        if session.ping_interval_secs >= session.read_timeout_secs {
            errors.push(ConfigurationError::incompatible(
                format!("session.ping_interval_secs={}", session.ping_interval_secs),
                format!("session.read_timeout_secs={}", session.read_timeout_secs),
                "Idle clients only send Pong replies, so the server Ping must go out before \
                the read deadline expires. Set the ping interval below the read timeout \
                (default 54s vs 60s).",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::multiple(errors))
        }
    }

    /// Validate the task store backend selection.
    pub fn validate_database(database: &DatabaseConfig) -> ConfigResult<()> {
        match database.backend {
            DatabaseBackend::Memory => Ok(()),
            DatabaseBackend::Sqlite if !cfg!(feature = "sqlite") => {
                Err(ConfigurationError::feature_unavailable(
                    "SQLite task store",
                    "The 'sqlite' feature is not enabled in this build",
                    "Use DAILIES__DATABASE__BACKEND=memory, or rebuild with --features sqlite",
                ))
            }
            DatabaseBackend::Sqlite => match database.path.as_deref() {
                Some(path) if path.trim().is_empty() => Err(ConfigurationError::missing_required(
                    "database.path",
                    "SQLite task store",
                    "DAILIES__DATABASE__PATH (or unset it to use the default data/dailies.sqlite)",
                )),
                _ => Ok(()),
            },
        }
    }

    fn collect(errors: &mut Vec<ConfigurationError>, error: ConfigurationError) {
        match error {
            ConfigurationError::Multiple(errs) => errors.extend(errs),
            e => errors.push(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_tick_interval_invalid() {
        let mut config = AppConfig::default();
        config.scheduler.tick_interval_secs = 0;
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("tick_interval_secs"));
        assert_eq!(err.count(), 1);
    }

    #[test]
    fn test_ping_must_precede_read_deadline() {
        let mut config = AppConfig::default();
        config.session.ping_interval_secs = 60;
        let err = ConfigValidator::validate(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Incompatible"));
        assert!(msg.contains("ping_interval_secs=60"));
        assert!(msg.contains("read_timeout_secs=60"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = AppConfig::default();
        config.hub.queue_capacity = 0;
        config.hub.inbox_capacity = 0;
        config.session.write_timeout_secs = 0;
        config.logging.level = "loud".to_string();

        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.is_multiple());
        assert_eq!(err.count(), 4);
        let msg = err.to_string();
        assert!(msg.contains("queue_capacity"));
        assert!(msg.contains("WRITE_TIMEOUT_SECS"));
        assert!(msg.contains("'loud'"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = AppConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_sqlite_path() {
        let mut database = DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            path: None,
        };
        if cfg!(feature = "sqlite") {
            assert!(ConfigValidator::validate_database(&database).is_ok());

            database.path = Some("  ".to_string());
            let err = ConfigValidator::validate_database(&database).unwrap_err();
            assert!(err.to_string().contains("database.path"));
        } else {
            let err = ConfigValidator::validate_database(&database).unwrap_err();
            assert!(err.to_string().contains("not available"));
        }
    }

    #[test]
    fn test_error_messages_contain_fix_hints() {
        let mut config = AppConfig::default();
        config.scheduler.tick_interval_secs = 0;
        config.session.ping_interval_secs = 0;

        let ConfigurationError::Multiple(errors) = ConfigValidator::validate(&config).unwrap_err()
        else {
            panic!("expected multiple errors");
        };
        for err in errors {
            let msg = err.to_string();
            assert!(
                msg.contains("Set ") || msg.contains("Use "),
                "Error missing fix hint: {msg}"
            );
        }
    }
}
