//! Durable storage for generated snapshots.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ContentType, Hostname, LeafId, Snapshot, SnapshotKey};

/// Errors surfaced by a [`SnapshotStore`].
#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// The durable Snapshot Cache table.
///
/// Keys are `(content_type, content_id, domain)`; at most one row exists per
/// key, so writes are upserts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The snapshot for `key`, fresh or invalidated.
    async fn get(&self, key: &SnapshotKey) -> Result<Option<Snapshot>, SnapshotStoreError>;

    /// Insert or replace the snapshot for its key. Replacing clears any
    /// invalidation mark.
    async fn put(&self, snapshot: &Snapshot) -> Result<(), SnapshotStoreError>;

    /// Mark every domain's snapshot of a leaf as invalidated. The rows are
    /// kept as last known good copies. Returns the number of rows touched.
    async fn invalidate(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<u64, SnapshotStoreError>;

    /// Remove every snapshot stored for `domain`.
    async fn delete_domain(&self, domain: &Hostname) -> Result<u64, SnapshotStoreError>;

    /// Every key stored for a leaf, across domains.
    async fn keys_for(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<Vec<SnapshotKey>, SnapshotStoreError>;

    async fn ping(&self) -> Result<(), SnapshotStoreError> {
        Ok(())
    }
}
