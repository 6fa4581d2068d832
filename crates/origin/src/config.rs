//! Origin application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORIGIN_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `ORIGIN_SNAPSHOT_URL` - Public URL of the snapshot service, for preview redirects
//!
//! ## Optional
//! - `ORIGIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ORIGIN_PORT` - Listen port (default: 3000)
//! - `ORIGIN_ASSET_BASE` - Prefix for the client bundle (default: /static)
//! - `ORIGIN_ASSET_DIR` - Directory served under `ORIGIN_ASSET_BASE`; unset when a CDN serves it
//! - `PAGESNAP_SYSTEM_DOMAINS` - Comma-separated system hostnames
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use pagesnap_core::SystemDomains;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Origin application configuration.
#[derive(Clone)]
pub struct OriginConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Snapshot service base URL that previews redirect to
    pub snapshot_url: Url,
    /// URL prefix of the client bundle
    pub asset_base: String,
    /// Local directory holding the client bundle
    pub asset_dir: Option<PathBuf>,
    /// Exact allow-list of platform hostnames
    pub system_domains: SystemDomains,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for OriginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("snapshot_url", &self.snapshot_url.as_str())
            .field("asset_base", &self.asset_base)
            .field("asset_dir", &self.asset_dir)
            .field("system_domains", &self.system_domains)
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl OriginConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let snapshot_url = Url::parse(&get_required_env("ORIGIN_SNAPSHOT_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("ORIGIN_SNAPSHOT_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url: get_database_url("ORIGIN_DATABASE_URL")?,
            host: parse_env("ORIGIN_HOST", "127.0.0.1")?,
            port: parse_env("ORIGIN_PORT", "3000")?,
            snapshot_url,
            asset_base: get_optional_env("ORIGIN_ASSET_BASE")
                .unwrap_or_else(|| "/static".to_string())
                .trim_end_matches('/')
                .to_string(),
            asset_dir: get_optional_env("ORIGIN_ASSET_DIR").map(PathBuf::from),
            system_domains: get_system_domains()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_system_domains() -> Result<SystemDomains, ConfigError> {
    match get_optional_env("PAGESNAP_SYSTEM_DOMAINS") {
        Some(list) => SystemDomains::from_csv(&list).map_err(|e| {
            ConfigError::InvalidEnvVar("PAGESNAP_SYSTEM_DOMAINS".to_string(), e.to_string())
        }),
        None => Ok(SystemDomains::default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_config() -> OriginConfig {
    OriginConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        snapshot_url: Url::parse("https://snap.pagesnap.app").unwrap(),
        asset_base: "/static".to_string(),
        asset_dir: None,
        system_domains: SystemDomains::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
