//! CLI configuration from environment variables.
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `PAGESNAP_SYSTEM_DOMAINS` - Comma-separated system hostnames
//! - `SNAPSHOT_PLATFORM_URL` - Public base of the system domain (default: `https://pagesnap.app`)

use pagesnap_core::SystemDomains;
use secrecy::SecretString;

use crate::commands::CliError;

pub struct CliConfig {
    pub database_url: SecretString,
    pub system_domains: SystemDomains,
    pub platform_url: String,
}

impl CliConfig {
    /// Load configuration, reading `.env` if present.
    pub fn from_env() -> Result<Self, CliError> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map(SecretString::from)
            .map_err(|_| CliError::MissingEnvVar("DATABASE_URL"))?;

        let system_domains = match std::env::var("PAGESNAP_SYSTEM_DOMAINS") {
            Ok(list) if !list.trim().is_empty() => SystemDomains::from_csv(&list)
                .map_err(|e| CliError::InvalidInput(format!("PAGESNAP_SYSTEM_DOMAINS: {e}")))?,
            _ => SystemDomains::default(),
        };

        let platform_url = std::env::var("SNAPSHOT_PLATFORM_URL")
            .unwrap_or_else(|_| "https://pagesnap.app".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url,
            system_domains,
            platform_url,
        })
    }

    /// Connect to the database.
    pub async fn pool(&self) -> Result<sqlx::PgPool, CliError> {
        tracing::info!("Connecting to database...");
        Ok(pagesnap_store::create_pool(&self.database_url).await?)
    }
}
