//! Database migration command.
//!
//! ```bash
//! pagesnap migrate
//! ```
//!
//! Migrations live in `crates/store/migrations/` and are embedded in the
//! binary. Servers never migrate on start-up.

use crate::commands::CliError;
use crate::config::CliConfig;

/// Apply every pending migration.
pub async fn run() -> Result<(), CliError> {
    let config = CliConfig::from_env()?;
    let pool = config.pool().await?;

    tracing::info!("Running migrations...");
    pagesnap_store::migrate(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
