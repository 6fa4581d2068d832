//! `PostgreSQL` [`SnapshotStore`] over the `snapshot_cache` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use pagesnap_core::{
    ContentType, Hostname, LeafId, Snapshot, SnapshotKey, SnapshotStore, SnapshotStoreError,
};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct KeyRow {
    content_type: String,
    content_id: LeafId,
    domain: String,
}

impl TryFrom<KeyRow> for SnapshotKey {
    type Error = RepositoryError;

    fn try_from(row: KeyRow) -> Result<Self, Self::Error> {
        let content_type: ContentType = row
            .content_type
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let domain = if row.domain.is_empty() {
            None
        } else {
            Some(Hostname::parse(&row.domain).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid snapshot domain: {e}"))
            })?)
        };
        Ok(Self::new(content_type, row.content_id, domain))
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    #[sqlx(flatten)]
    key: KeyRow,
    html: String,
    generated_at: DateTime<Utc>,
    invalidated_at: Option<DateTime<Utc>>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = RepositoryError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: SnapshotKey::try_from(row.key)?,
            html: row.html,
            generated_at: row.generated_at,
            invalidated_at: row.invalidated_at,
        })
    }
}

/// Snapshot Cache table access.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &SnapshotKey) -> Result<Option<Snapshot>, SnapshotStoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"
            SELECT content_type, content_id, domain, html, generated_at, invalidated_at
            FROM snapshot_cache
            WHERE content_type = $1 AND content_id = $2 AND domain = $3
            ",
        )
        .bind(key.content_type.as_str())
        .bind(key.content_id)
        .bind(key.domain_column())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(Snapshot::try_from).transpose()?)
    }

    #[instrument(skip(self, snapshot), fields(key = %snapshot.key, bytes = snapshot.html.len()))]
    async fn put(&self, snapshot: &Snapshot) -> Result<(), SnapshotStoreError> {
        sqlx::query(
            r"
            INSERT INTO snapshot_cache (content_type, content_id, domain, html, generated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (content_type, content_id, domain) DO UPDATE
            SET html = EXCLUDED.html,
                generated_at = EXCLUDED.generated_at,
                invalidated_at = NULL
            ",
        )
        .bind(snapshot.key.content_type.as_str())
        .bind(snapshot.key.content_id)
        .bind(snapshot.key.domain_column())
        .bind(&snapshot.html)
        .bind(snapshot.generated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        debug!("Snapshot stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<u64, SnapshotStoreError> {
        let result = sqlx::query(
            r"
            UPDATE snapshot_cache
            SET invalidated_at = COALESCE(invalidated_at, now())
            WHERE content_type = $1 AND content_id = $2
            ",
        )
        .bind(content_type.as_str())
        .bind(content_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(domain = %domain))]
    async fn delete_domain(&self, domain: &Hostname) -> Result<u64, SnapshotStoreError> {
        let result = sqlx::query("DELETE FROM snapshot_cache WHERE domain = $1")
            .bind(domain.as_str())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn keys_for(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<Vec<SnapshotKey>, SnapshotStoreError> {
        let rows = sqlx::query_as::<_, KeyRow>(
            r"
            SELECT content_type, content_id, domain
            FROM snapshot_cache
            WHERE content_type = $1 AND content_id = $2
            ORDER BY domain
            ",
        )
        .bind(content_type.as_str())
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows
            .into_iter()
            .map(SnapshotKey::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn ping(&self) -> Result<(), SnapshotStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}
