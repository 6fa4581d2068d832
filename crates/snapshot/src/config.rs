//! Snapshot service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SNAPSHOT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SNAPSHOT_ORIGIN_URL` - Base URL of the origin application, used when failing open
//!
//! ## Optional
//! - `SNAPSHOT_HOST` - Bind address (default: 127.0.0.1)
//! - `SNAPSHOT_PORT` - Listen port (default: 3100)
//! - `SNAPSHOT_PLATFORM_URL` - Public base of the system domain (default: `https://pagesnap.app`)
//! - `SNAPSHOT_ADMIN_TOKEN` - Bearer token for `/admin/*`; admin routes are disabled without it
//! - `SNAPSHOT_MEMORY_TTL_SECS` - In-process cache TTL (default: 300)
//! - `SNAPSHOT_MEMORY_CAPACITY` - In-process cache entries (default: 10000)
//! - `SNAPSHOT_ORIGIN_TIMEOUT_SECS` - Timeout when forwarding to the origin (default: 10)
//! - `PAGESNAP_SYSTEM_DOMAINS` - Comma-separated system hostnames
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use pagesnap_core::SystemDomains;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

const MIN_ADMIN_TOKEN_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Snapshot service configuration.
#[derive(Clone)]
pub struct SnapshotConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Where to forward requests when failing open
    pub origin_url: Url,
    /// Public base URL of the system domain, used for domain-less canonicals
    pub platform_url: String,
    /// Bearer token guarding the admin routes
    pub admin_token: Option<SecretString>,
    /// In-process snapshot cache time-to-live
    pub memory_ttl: Duration,
    /// In-process snapshot cache capacity
    pub memory_capacity: u64,
    /// Timeout for fail-open requests to the origin
    pub origin_timeout: Duration,
    /// Exact allow-list of platform hostnames
    pub system_domains: SystemDomains,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for SnapshotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("origin_url", &self.origin_url.as_str())
            .field("platform_url", &self.platform_url)
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("memory_ttl", &self.memory_ttl)
            .field("memory_capacity", &self.memory_capacity)
            .field("origin_timeout", &self.origin_timeout)
            .field("system_domains", &self.system_domains)
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl SnapshotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the admin token fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SNAPSHOT_DATABASE_URL")?;
        let host = parse_env("SNAPSHOT_HOST", "127.0.0.1")?;
        let port = parse_env("SNAPSHOT_PORT", "3100")?;
        let origin_url = Url::parse(&get_required_env("SNAPSHOT_ORIGIN_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("SNAPSHOT_ORIGIN_URL".to_string(), e.to_string())
        })?;
        let platform_url = get_env_or_default("SNAPSHOT_PLATFORM_URL", "https://pagesnap.app")
            .trim_end_matches('/')
            .to_string();

        let admin_token = get_optional_env("SNAPSHOT_ADMIN_TOKEN")
            .map(|token| {
                validate_admin_token(&token, "SNAPSHOT_ADMIN_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;

        let memory_ttl = Duration::from_secs(parse_env("SNAPSHOT_MEMORY_TTL_SECS", "300")?);
        let memory_capacity = parse_env("SNAPSHOT_MEMORY_CAPACITY", "10000")?;
        let origin_timeout = Duration::from_secs(parse_env("SNAPSHOT_ORIGIN_TIMEOUT_SECS", "10")?);
        let system_domains = get_system_domains()?;

        Ok(Self {
            database_url,
            host,
            port,
            origin_url,
            platform_url,
            admin_token,
            memory_ttl,
            memory_capacity,
            origin_timeout,
            system_domains,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether `candidate` is the configured admin token.
    #[must_use]
    pub fn admin_token_matches(&self, candidate: &str) -> bool {
        self.admin_token
            .as_ref()
            .is_some_and(|token| {
                bool::from(token.expose_secret().as_bytes().ct_eq(candidate.as_bytes()))
            })
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

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
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

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject short, placeholder or low-entropy admin tokens.
fn validate_admin_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_ADMIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_ADMIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_config() -> SnapshotConfig {
    SnapshotConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 3100,
        origin_url: Url::parse("http://127.0.0.1:9").unwrap_or_else(|_| unreachable!()),
        platform_url: "https://pagesnap.app".to_string(),
        admin_token: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6e")),
        memory_ttl: Duration::from_secs(300),
        memory_capacity: 100,
        origin_timeout: Duration::from_secs(1),
        system_domains: SystemDomains::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
