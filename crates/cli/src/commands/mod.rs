//! CLI command implementations.

pub mod inspect;
pub mod migrate;
pub mod regenerate;

use thiserror::Error;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Argument or environment value could not be used.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No regeneration scope given.
    #[error("one of --store, --website, --funnel, --page or --step is required")]
    MissingScope,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] pagesnap_core::DirectoryError),

    /// The snapshot service refused the operation.
    #[error("{0}")]
    Snapshot(#[from] pagesnap_snapshot::error::AppError),

    /// Some snapshots could not be regenerated.
    #[error("{failed} of {total} snapshots failed to regenerate")]
    Incomplete { failed: usize, total: usize },

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
