//! Diagnostics: what a request resolves to, and who is a crawler.
//!
//! Both commands print JSON to stdout so the output can be piped into `jq`.

use std::sync::Arc;

use pagesnap_core::{ResolveError, Resolver, classifier};
use pagesnap_store::PgDirectory;
use serde_json::json;

use crate::commands::CliError;
use crate::config::CliConfig;

/// Resolve `(host, path)` exactly as the edge, snapshot service and origin do.
pub async fn resolve(host: &str, path: &str) -> Result<(), CliError> {
    let config = CliConfig::from_env()?;
    let pool = config.pool().await?;
    let resolver = Resolver::new(Arc::new(PgDirectory::new(pool)), config.system_domains);

    let output = match resolver.resolve_raw(host, path).await {
        Ok(content) => json!({ "content": content }),
        Err(ResolveError::Directory(e)) => return Err(e.into()),
        Err(e) => json!({ "error": e.kind(), "message": e.to_string() }),
    };
    emit(&output)
}

/// Classify a `User-Agent` string.
pub fn classify(user_agent: &str) -> Result<(), CliError> {
    emit(&json!(classifier::classify(user_agent)))
}

#[allow(clippy::print_stdout)]
fn emit(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
