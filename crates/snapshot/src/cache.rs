//! Snapshot Cache access layer.
//!
//! Two tiers: a moka in-process cache in front of the durable
//! [`SnapshotStore`]. Concurrent misses for the same key are collapsed onto
//! one generation (per-instance single flight); across instances redundant
//! generation is accepted since the output is deterministic.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use pagesnap_core::{ContentType, Hostname, LeafId, Snapshot, SnapshotKey, SnapshotStore, SnapshotStoreError};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::pipeline::GenerationError;

/// Which code path produced a response. Sent as `x-snapshot-source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotSource {
    /// Served from the in-process tier.
    Memory,
    /// Loaded from the durable store.
    Cache,
    /// Generated for this request.
    Generated,
    /// Generation failed; the last good (invalidated) copy was served.
    Stale,
    /// No snapshot; the origin answered instead.
    OriginFallback,
}

impl SnapshotSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cache => "cache",
            Self::Generated => "generated",
            Self::Stale => "stale",
            Self::OriginFallback => "origin-fallback",
        }
    }
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct Cached {
    snapshot: Arc<Snapshot>,
    loaded_from: SnapshotSource,
}

/// The two-tier snapshot cache.
#[derive(Clone)]
pub struct SnapshotCache {
    memory: Cache<SnapshotKey, Cached>,
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, capacity: u64, ttl: Duration) -> Self {
        let memory = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { memory, store }
    }

    /// The durable tier.
    #[must_use]
    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    /// Fresh snapshot for `key`, generating it with `generate` on a miss.
    ///
    /// A durable read error is treated as a miss. When generation fails and
    /// an invalidated copy exists, that copy is returned as
    /// [`SnapshotSource::Stale`].
    ///
    /// # Errors
    ///
    /// The generation error when nothing can be served.
    #[instrument(skip(self, generate), fields(key = %key))]
    pub async fn get_or_generate<F>(
        &self,
        key: &SnapshotKey,
        generate: F,
    ) -> Result<(Arc<Snapshot>, SnapshotSource), Arc<GenerationError>>
    where
        F: Future<Output = Result<Snapshot, GenerationError>> + Send,
    {
        if let Some(hit) = self.memory.get(key).await {
            return Ok((hit.snapshot, SnapshotSource::Memory));
        }

        let entry = self
            .memory
            .entry(key.clone())
            .or_try_insert_with(async {
                if let Some(snapshot) = self.durable(key).await.filter(Snapshot::is_fresh) {
                    return Ok::<_, GenerationError>(Cached {
                        snapshot: Arc::new(snapshot),
                        loaded_from: SnapshotSource::Cache,
                    });
                }
                let snapshot = generate.await?;
                self.persist(&snapshot).await;
                Ok::<_, GenerationError>(Cached {
                    snapshot: Arc::new(snapshot),
                    loaded_from: SnapshotSource::Generated,
                })
            })
            .await;

        match entry {
            Ok(entry) => {
                let source = if entry.is_fresh() {
                    entry.value().loaded_from
                } else {
                    SnapshotSource::Memory
                };
                Ok((entry.into_value().snapshot, source))
            }
            Err(err) => match self.durable(key).await {
                Some(stale) => {
                    warn!(error = %err, kind = %err.kind(), "Generation failed, serving stale snapshot");
                    Ok((Arc::new(stale), SnapshotSource::Stale))
                }
                None => Err(err),
            },
        }
    }

    /// Write a freshly generated snapshot to both tiers.
    ///
    /// # Errors
    ///
    /// Returns the durable store error; the in-process tier is only
    /// updated on success.
    pub async fn store_generated(&self, snapshot: Snapshot) -> Result<(), SnapshotStoreError> {
        self.store.put(&snapshot).await?;
        self.memory
            .insert(
                snapshot.key.clone(),
                Cached {
                    snapshot: Arc::new(snapshot),
                    loaded_from: SnapshotSource::Generated,
                },
            )
            .await;
        Ok(())
    }

    /// Mark every snapshot of a leaf stale, across all domains.
    ///
    /// # Errors
    ///
    /// Returns the durable store error.
    #[instrument(skip(self))]
    pub async fn invalidate_leaf(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<u64, SnapshotStoreError> {
        self.evict(move |key| key.content_type == content_type && key.content_id == content_id);
        let count = self.store.invalidate(content_type, content_id).await?;
        debug!(count, "Leaf snapshots invalidated");
        Ok(count)
    }

    /// Drop every snapshot rendered for `domain`.
    ///
    /// # Errors
    ///
    /// Returns the durable store error.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn delete_domain(&self, domain: &Hostname) -> Result<u64, SnapshotStoreError> {
        let target = domain.clone();
        self.evict(move |key| key.domain.as_ref() == Some(&target));
        let count = self.store.delete_domain(domain).await?;
        debug!(count, "Domain snapshots deleted");
        Ok(count)
    }

    /// Empty the in-process tier.
    pub async fn clear_memory(&self) {
        self.memory.invalidate_all();
        self.memory.run_pending_tasks().await;
    }

    fn evict(&self, predicate: impl Fn(&SnapshotKey) -> bool + Send + Sync + 'static) {
        if let Err(e) = self.memory.invalidate_entries_if(move |key, _| predicate(key)) {
            warn!(error = %e, "Could not register in-process invalidation, clearing tier");
            self.memory.invalidate_all();
        }
    }

    async fn durable(&self, key: &SnapshotKey) -> Option<Snapshot> {
        match self.store.get(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, key = %key, "Snapshot store read failed, treating as miss");
                None
            }
        }
    }

    async fn persist(&self, snapshot: &Snapshot) {
        if let Err(e) = self.store.put(snapshot).await {
            warn!(error = %e, key = %snapshot.key, "Snapshot store write failed");
        }
    }
}
