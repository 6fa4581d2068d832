//! Pagesnap Store - `PostgreSQL` persistence.
//!
//! # Tables
//!
//! - `stores` - Tenants
//! - `custom_domains` - Tenant hostnames and their DNS verification state
//! - `domain_connections` - Domain to website/funnel bindings (one homepage per domain)
//! - `websites`, `website_pages` - Website roots and their pages
//! - `funnels`, `funnel_steps` - Funnel roots and their steps
//! - `snapshot_cache` - Generated HTML, keyed by `(content_type, content_id, domain)`
//!
//! # Migrations
//!
//! Migrations live in `crates/store/migrations/` and are applied only by the CLI:
//! ```bash
//! cargo run -p pagesnap-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `query_as` and `FromRow` rows, so the
//! crate compiles without a live database.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod directory;
pub mod snapshots;

use std::time::Duration;

use pagesnap_core::{DirectoryError, SnapshotStoreError};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use directory::PgDirectory;
pub use snapshots::PgSnapshotStore;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl From<RepositoryError> for DirectoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
            RepositoryError::DataCorruption(msg) => Self::DataCorruption(msg),
        }
    }
}

impl From<RepositoryError> for SnapshotStoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
            RepositoryError::DataCorruption(msg) => Self::DataCorruption(msg),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns the migrator's error if any migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
