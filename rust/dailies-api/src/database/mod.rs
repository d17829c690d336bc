//! Database abstraction layer.
//!
//! The reset scheduler only sees the [`TaskStore`] trait. Two backends
//! implement it:
//! - **In-memory**: default, and used by the tests
//! - **SQLite**: file-backed, behind the `sqlite` feature

pub mod memory;
pub mod repository;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use memory::InMemoryStore;
pub use repository::TaskStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Create a task store from configuration.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub async fn create_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    match config.backend {
        DatabaseBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        DatabaseBackend::Sqlite => {
            let path = config.path.as_deref().unwrap_or(DatabaseConfig::DEFAULT_PATH);
            Ok(Arc::new(SqliteStore::open(path).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseBackend::Sqlite => {
            tracing::warn!("SQLite feature not enabled, using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
