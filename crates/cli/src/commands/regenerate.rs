//! Snapshot maintenance commands.
//!
//! These drive the same [`SnapshotService`] the snapshot server uses, against
//! the `PostgreSQL` directory and snapshot table.

use std::sync::Arc;
use std::time::Duration;

use pagesnap_core::{ContentType, Hostname, LeafId, RootId, RootKind, StoreId};
use pagesnap_snapshot::{RegenerationReport, SnapshotService};
use pagesnap_store::{PgDirectory, PgSnapshotStore};
use uuid::Uuid;

use crate::commands::CliError;
use crate::config::CliConfig;

/// The in-process tier only lives for one command.
const MEMORY_CAPACITY: u64 = 1_000;
const MEMORY_TTL: Duration = Duration::from_secs(60);

/// What to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Store(Uuid),
    Website(Uuid),
    Funnel(Uuid),
    Page(Uuid),
    Step(Uuid),
}

async fn service() -> Result<SnapshotService, CliError> {
    let config = CliConfig::from_env()?;
    let pool = config.pool().await?;
    Ok(SnapshotService::new(
        Arc::new(PgDirectory::new(pool.clone())),
        Arc::new(PgSnapshotStore::new(pool)),
        config.system_domains,
        &config.platform_url,
        MEMORY_CAPACITY,
        MEMORY_TTL,
    ))
}

/// Regenerate every snapshot in `scope`.
pub async fn run(scope: Scope) -> Result<(), CliError> {
    let service = service().await?;
    tracing::info!(?scope, "Regenerating snapshots...");

    let report = match scope {
        Scope::Store(id) => service.regenerate_store(StoreId::new(id)).await?,
        Scope::Website(id) => {
            service
                .regenerate_root(RootKind::Website, RootId::new(id))
                .await?
        }
        Scope::Funnel(id) => {
            service
                .regenerate_root(RootKind::Funnel, RootId::new(id))
                .await?
        }
        Scope::Page(id) => {
            service
                .regenerate_leaf(ContentType::WebsitePage, LeafId::new(id))
                .await?
        }
        Scope::Step(id) => {
            service
                .regenerate_leaf(ContentType::FunnelStep, LeafId::new(id))
                .await?
        }
    };

    summarize(&report)
}

fn summarize(report: &RegenerationReport) -> Result<(), CliError> {
    for key in &report.succeeded {
        tracing::debug!(key = %key, "Regenerated");
    }
    for failure in &report.failed {
        tracing::warn!(key = %failure.key, kind = %failure.kind, error = %failure.error, "Regeneration failed");
    }
    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        invalidated = report.invalidated,
        "Regeneration complete"
    );

    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: report.failed.len(),
            total: report.failed.len() + report.succeeded.len(),
        })
    }
}

/// Invalidate or delete the snapshots reachable through `domain`.
pub async fn invalidate_domain(domain: &str, delete: bool) -> Result<(), CliError> {
    let host = Hostname::parse(domain).map_err(|e| CliError::InvalidInput(format!("{domain}: {e}")))?;
    let service = service().await?;

    if delete {
        let count = service.forget_domain(&host).await?;
        tracing::info!(domain = %host, count, "Snapshots deleted");
    } else {
        let count = service.invalidate_domain(&host).await?;
        tracing::info!(domain = %host, count, "Snapshots invalidated");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pagesnap_core::{ErrorKind, SnapshotKey};
    use pagesnap_snapshot::service::FailedTarget;

    use super::*;

    fn key() -> SnapshotKey {
        SnapshotKey::new(ContentType::WebsitePage, LeafId::new(Uuid::nil()), None)
    }

    #[test]
    fn test_summary_fails_on_partial_report() {
        let report = RegenerationReport {
            succeeded: vec![key()],
            failed: vec![FailedTarget {
                key: key(),
                kind: ErrorKind::GenerationFailure,
                error: "bad document".to_string(),
            }],
            invalidated: 0,
        };
        let err = summarize(&report).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 snapshots failed to regenerate");
    }

    #[test]
    fn test_summary_accepts_complete_report() {
        let report = RegenerationReport {
            succeeded: vec![key()],
            ..RegenerationReport::default()
        };
        assert!(summarize(&report).is_ok());
    }
}
