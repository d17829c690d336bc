//! Structured logging utilities.
//!
//! Operation timing plus a few macros that keep startup output uniform:
//! numbered init steps, warnings, success lines and a banner.

use std::time::Instant;

/// Operation timer for measuring and logging execution duration.
///
/// Logs at debug level on creation and at info (or error) level when
/// finished, with the elapsed milliseconds as a structured field.
///
/// # Examples
///
/// ```rust,ignore
/// use dailies_api::logging::OpTimer;
///
/// let timer = OpTimer::new("database", "open");
/// let store = create_store(&config.database).await;
/// timer.finish_with_result(store.as_ref());
/// ```
#[derive(Debug)]
pub struct OpTimer {
    /// Component being timed (e.g., "scheduler", "database").
    component: String,
    /// Operation being performed (e.g., "tick", "open").
    operation: String,
    start: Instant,
}

impl OpTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        let component = component.into();
        let operation = operation.into();

        tracing::debug!(
            component = %component,
            operation = %operation,
            "Operation started"
        );

        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }

    /// Milliseconds since the timer started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Finishes the timer and logs the duration.
    pub fn finish(self) {
        tracing::info!(
            component = %self.component,
            operation = %self.operation,
            duration_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }

    /// Finishes the timer with result-aware logging.
    ///
    /// Logs success or error based on the result, including the error
    /// message when the operation failed.
    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.elapsed_ms();

        match result {
            Ok(_) => {
                tracing::info!(
                    component = %self.component,
                    operation = %self.operation,
                    duration_ms = duration_ms,
                    "Operation completed successfully"
                );
            }
            Err(e) => {
                tracing::error!(
                    component = %self.component,
                    operation = %self.operation,
                    duration_ms = duration_ms,
                    error = %e,
                    "Operation failed"
                );
            }
        }
    }
}

/// Macro for logging initialization steps with consistent formatting.
///
/// # Examples
///
/// ```rust,ignore
/// log_init_step!(1, 4, "Task store", "sqlite (data/dailies.sqlite)");
/// log_init_step!(2, 4, "Notification hub", "queue capacity 256");
/// ```
#[macro_export]
macro_rules! log_init_step {
    ($step:expr, $total:expr, $name:expr, $detail:expr) => {
        tracing::info!(
            step = $step,
            total = $total,
            "[{}/{}] {} - {}",
            $step,
            $total,
            $name,
            $detail
        );
    };
    ($step:expr, $total:expr, $name:expr) => {
        tracing::info!(
            step = $step,
            total = $total,
            "[{}/{}] {}",
            $step,
            $total,
            $name
        );
    };
}

/// Macro for logging warnings during initialization.
///
/// # Examples
///
/// ```rust,ignore
/// log_init_warning!("Reset scheduler disabled by configuration");
/// ```
#[macro_export]
macro_rules! log_init_warning {
    ($msg:expr) => {
        tracing::warn!("⚠️  {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::warn!("⚠️  {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging successful completion of major phases.
///
/// # Examples
///
/// ```rust,ignore
/// log_success!("Dailies API server created successfully");
/// ```
#[macro_export]
macro_rules! log_success {
    ($msg:expr) => {
        tracing::info!("✅ {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::info!("✅ {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging startup banners.
///
/// # Examples
///
/// ```rust,ignore
/// log_banner!("Dailies API v0.1.0", "Listening on 0.0.0.0:8080");
/// ```
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        tracing::info!("");
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("");
    };
    ($title:expr, $subtitle:expr) => {
        tracing::info!("");
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("  {}", $subtitle);
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("");
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_timer_creation() {
        let timer = OpTimer::new("scheduler", "tick");
        assert_eq!(timer.component, "scheduler");
        assert_eq!(timer.operation, "tick");
        assert!(timer.elapsed_ms() < 1_000);
    }

    #[test]
    fn test_op_timer_finish() {
        OpTimer::new("hub", "start").finish();
    }

    #[test]
    fn test_op_timer_finish_with_result() {
        let ok: Result<usize, String> = Ok(3);
        OpTimer::new("scheduler", "tick").finish_with_result(ok.as_ref());

        let err: Result<usize, String> = Err("connection refused".to_string());
        OpTimer::new("scheduler", "tick").finish_with_result(err.as_ref());
    }

    #[test]
    fn test_macros_expand() {
        log_init_step!(1, 2, "Task store", "memory");
        log_init_step!(2, 2, "Notification hub");
        log_init_warning!("scheduler disabled");
        log_init_warning!("{} subscribers dropped", 3);
        log_success!("ready");
        log_banner!("Dailies API", "test");
    }
}
