//! Edge dispatcher configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `EDGE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string, for domain checks
//! - `EDGE_SNAPSHOT_URL` - Base URL of the snapshot service
//! - `EDGE_ORIGIN_URL` - Base URL of the origin application
//!
//! ## Optional
//! - `EDGE_HOST` - Bind address (default: 0.0.0.0)
//! - `EDGE_PORT` - Listen port (default: 8080)
//! - `EDGE_UPSTREAM_TIMEOUT_SECS` - Timeout for upstream calls (default: 10)
//! - `EDGE_DOMAIN_CACHE_TTL_SECS` - How long a domain check is cached (default: 60)
//! - `PAGESNAP_SYSTEM_DOMAINS` - Comma-separated system hostnames
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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

/// Edge dispatcher configuration.
#[derive(Clone)]
pub struct EdgeConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Snapshot service base URL
    pub snapshot_url: Url,
    /// Origin application base URL
    pub origin_url: Url,
    /// Timeout for calls to either upstream
    pub upstream_timeout: Duration,
    /// Time-to-live of cached domain checks
    pub domain_cache_ttl: Duration,
    /// Exact allow-list of platform hostnames
    pub system_domains: SystemDomains,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for EdgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("snapshot_url", &self.snapshot_url.as_str())
            .field("origin_url", &self.origin_url.as_str())
            .field("upstream_timeout", &self.upstream_timeout)
            .field("domain_cache_ttl", &self.domain_cache_ttl)
            .field("system_domains", &self.system_domains)
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl EdgeConfig {
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

        Ok(Self {
            database_url: get_database_url("EDGE_DATABASE_URL")?,
            host: parse_env("EDGE_HOST", "0.0.0.0")?,
            port: parse_env("EDGE_PORT", "8080")?,
            snapshot_url: get_url("EDGE_SNAPSHOT_URL")?,
            origin_url: get_url("EDGE_ORIGIN_URL")?,
            upstream_timeout: Duration::from_secs(parse_env("EDGE_UPSTREAM_TIMEOUT_SECS", "10")?),
            domain_cache_ttl: Duration::from_secs(parse_env("EDGE_DOMAIN_CACHE_TTL_SECS", "60")?),
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

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default`.
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

fn get_url(key: &str) -> Result<Url, ConfigError> {
    Url::parse(&get_required_env(key)?)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_system_domains() -> Result<SystemDomains, ConfigError> {
    get_optional_env("PAGESNAP_SYSTEM_DOMAINS").map_or_else(
        || Ok(SystemDomains::default()),
        |list| {
            SystemDomains::from_csv(&list).map_err(|e| {
                ConfigError::InvalidEnvVar("PAGESNAP_SYSTEM_DOMAINS".to_string(), e.to_string())
            })
        },
    )
}

#[cfg(test)]
pub(crate) fn test_config(snapshot_url: Url, origin_url: Url) -> EdgeConfig {
    EdgeConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 8080,
        snapshot_url,
        origin_url,
        upstream_timeout: Duration::from_secs(2),
        domain_cache_ttl: Duration::from_secs(60),
        system_domains: SystemDomains::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
