//! The snapshot service: resolver, generator and cache wired together.
//!
//! Used by the HTTP handlers and by the operator CLI, so a regeneration
//! triggered from either place behaves the same.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pagesnap_core::{
    ContentRef, ContentRoot, ContentType, Directory, ErrorKind, Hostname, LeafId, Resolver,
    RootId, RootKind, Snapshot, SnapshotKey, SnapshotStore, StoreId, SystemDomains,
    find_verified_domain,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::{SnapshotCache, SnapshotSource};
use crate::config::SnapshotConfig;
use crate::error::{AppError, Result};
use crate::pipeline::{GenerationError, Generator};

/// A key that could not be regenerated.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub key: SnapshotKey,
    pub kind: ErrorKind,
    pub error: String,
}

/// Outcome of a regeneration: per-key success or failure, plus how many
/// existing snapshots were marked stale beforehand.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegenerationReport {
    pub succeeded: Vec<SnapshotKey>,
    pub failed: Vec<FailedTarget>,
    pub invalidated: u64,
}

impl RegenerationReport {
    pub fn merge(&mut self, other: Self) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.invalidated += other.invalidated;
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot resolution, generation and caching.
#[derive(Clone)]
pub struct SnapshotService {
    resolver: Resolver,
    generator: Generator,
    cache: SnapshotCache,
}

impl SnapshotService {
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn SnapshotStore>,
        system_domains: SystemDomains,
        platform_url: &str,
        memory_capacity: u64,
        memory_ttl: Duration,
    ) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&directory), system_domains),
            generator: Generator::new(directory, platform_url),
            cache: SnapshotCache::new(store, memory_capacity, memory_ttl),
        }
    }

    #[must_use]
    pub fn from_config(
        config: &SnapshotConfig,
        directory: Arc<dyn Directory>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self::new(
            directory,
            store,
            config.system_domains.clone(),
            &config.platform_url,
            config.memory_capacity,
            config.memory_ttl,
        )
    }

    #[must_use]
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[must_use]
    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    #[must_use]
    pub const fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    fn directory(&self) -> &dyn Directory {
        self.resolver.directory()
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// The snapshot for resolved content.
    ///
    /// Previews are rendered on every request and never cached.
    ///
    /// # Errors
    ///
    /// The generation error when no snapshot can be served.
    pub async fn render(
        &self,
        content: &ContentRef,
    ) -> std::result::Result<(Arc<Snapshot>, SnapshotSource), Arc<GenerationError>> {
        let Some(key) = SnapshotKey::for_ref(content) else {
            return Err(Arc::new(GenerationError::NotFound(content.slug_path.clone())));
        };

        if content.preview {
            let snapshot = self.generator.generate(&key, true).await.map_err(Arc::new)?;
            return Ok((Arc::new(snapshot), SnapshotSource::Generated));
        }

        self.cache
            .get_or_generate(&key, self.generator.generate(&key, false))
            .await
    }

    // =========================================================================
    // Regeneration
    // =========================================================================

    /// Regenerate a leaf on every domain it is reachable through.
    ///
    /// Existing snapshots are invalidated first, so a key whose regeneration
    /// fails keeps its old copy only as a stale fallback. A leaf that is no
    /// longer public is just invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory or the durable store is
    /// unreachable; per-key failures are in the report.
    #[instrument(skip(self))]
    pub async fn regenerate_leaf(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<RegenerationReport> {
        let invalidated = self.cache.invalidate_leaf(content_type, content_id).await?;
        let mut report = match self.generator.targets(content_type, content_id).await {
            Ok(keys) => self.regenerate_keys(keys).await,
            Err(GenerationError::NotFound(_)) => RegenerationReport::default(),
            Err(e) => return Err(e.into()),
        };
        report.invalidated = invalidated;
        Ok(report)
    }

    /// Regenerate every leaf under a website or funnel.
    ///
    /// # Errors
    ///
    /// See [`Self::regenerate_leaf`].
    #[instrument(skip(self))]
    pub async fn regenerate_root(&self, kind: RootKind, root: RootId) -> Result<RegenerationReport> {
        let mut report = RegenerationReport::default();
        for leaf in self.directory().leaves(kind, root).await? {
            report.merge(self.regenerate_leaf(leaf.content_type, leaf.id).await?);
        }
        Ok(report)
    }

    /// Regenerate everything a store owns.
    ///
    /// # Errors
    ///
    /// See [`Self::regenerate_leaf`].
    #[instrument(skip(self))]
    pub async fn regenerate_store(&self, store: StoreId) -> Result<RegenerationReport> {
        let mut report = RegenerationReport::default();
        for root in self.directory().roots_for_store(store).await? {
            report.merge(self.regenerate_root(root.kind, root.id).await?);
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            invalidated = report.invalidated,
            "Store regenerated"
        );
        Ok(report)
    }

    /// Regenerate the snapshots of a single custom domain.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] for a domain that is not verified.
    #[instrument(skip(self), fields(domain = %host))]
    pub async fn regenerate_domain(&self, host: &Hostname) -> Result<RegenerationReport> {
        let domain = find_verified_domain(self.directory(), host)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("domain {host}")))?;

        let mut keys = Vec::new();
        for connection in self.directory().connections(domain.id).await? {
            let Some(root) = self
                .directory()
                .root(connection.root_kind, connection.root_id)
                .await?
                .filter(ContentRoot::is_public)
            else {
                continue;
            };
            for leaf in self.directory().leaves(root.kind, root.id).await? {
                if leaf.published {
                    keys.push(SnapshotKey::new(
                        leaf.content_type,
                        leaf.id,
                        Some(domain.domain.clone()),
                    ));
                }
            }
        }
        Ok(self.regenerate_keys(keys).await)
    }

    /// Generate and store each key concurrently. A failure is recorded
    /// against its key and does not affect the others.
    pub async fn regenerate_keys(&self, keys: Vec<SnapshotKey>) -> RegenerationReport {
        let outcomes = join_all(keys.into_iter().map(|key| async move {
            let outcome = match self.generator.generate(&key, false).await {
                Ok(snapshot) => self
                    .cache
                    .store_generated(snapshot)
                    .await
                    .map_err(|e| (ErrorKind::Unavailable, e.to_string())),
                Err(e) => Err((e.kind(), e.to_string())),
            };
            (key, outcome)
        }))
        .await;

        let mut report = RegenerationReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(key),
                Err((kind, error)) => {
                    warn!(key = %key, kind = %kind, error = %error, "Snapshot regeneration failed");
                    report.failed.push(FailedTarget { key, kind, error });
                }
            }
        }
        report
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Invalidate every leaf under a root, on all domains.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or store is unreachable.
    #[instrument(skip(self))]
    pub async fn invalidate_root(&self, kind: RootKind, root: RootId) -> Result<u64> {
        let mut count = 0;
        for leaf in self.directory().leaves(kind, root).await? {
            count += self.cache.invalidate_leaf(leaf.content_type, leaf.id).await?;
        }
        Ok(count)
    }

    /// Mark stale every snapshot of every root connected to a domain, on
    /// all domains those roots are reachable through.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] for a domain that is not verified.
    #[instrument(skip(self), fields(domain = %host))]
    pub async fn invalidate_domain(&self, host: &Hostname) -> Result<u64> {
        let domain = find_verified_domain(self.directory(), host)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("domain {host}")))?;

        let mut count = 0;
        for connection in self.directory().connections(domain.id).await? {
            count += self
                .invalidate_root(connection.root_kind, connection.root_id)
                .await?;
        }
        Ok(count)
    }

    /// Drop every snapshot rendered for a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    pub async fn forget_domain(&self, host: &Hostname) -> Result<u64> {
        Ok(self.cache.delete_domain(host).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pagesnap_core::memory::{Fixture, InMemorySnapshotStore};

    use super::*;

    fn service(fx: &Fixture, store: &InMemorySnapshotStore) -> SnapshotService {
        SnapshotService::new(
            Arc::new(fx.directory.clone()),
            Arc::new(store.clone()),
            SystemDomains::default(),
            "https://pagesnap.app",
            100,
            Duration::from_secs(60),
        )
    }

    fn host(s: &str) -> Hostname {
        Hostname::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_regenerate_website_with_two_domains_writes_three_snapshots() {
        let fx = Fixture::shop();
        let second = fx.directory.add_domain(fx.store, host("acme.example.org"), true);
        fx.directory
            .connect(second, RootKind::Website, fx.website, true, None);
        let store = InMemorySnapshotStore::new();

        let report = service(&fx, &store)
            .regenerate_leaf(ContentType::WebsitePage, fx.home_page)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.succeeded.len(), 3);
        let all = store.all();
        assert_eq!(all.len(), 3);
        let canonicals: std::collections::HashSet<_> = all
            .iter()
            .map(|s| {
                let start = s.html.find(r#"rel="canonical" href=""#).unwrap();
                s.html[start..].split('"').nth(3).unwrap().to_string()
            })
            .collect();
        assert_eq!(canonicals.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_on_one_key_does_not_block_siblings() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let service = service(&fx, &store);

        let keys = vec![
            SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None),
            SnapshotKey::new(ContentType::WebsitePage, fx.about_page, Some(host("nowhere.example.com"))),
            SnapshotKey::new(ContentType::WebsitePage, fx.about_page, Some(host(Fixture::SHOP_HOST))),
        ];
        let report = service.regenerate_keys(keys).await;

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, ErrorKind::ContentNotConnected);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_unpublished_leaf_is_invalidated_not_regenerated() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let service = service(&fx, &store);
        service
            .regenerate_leaf(ContentType::WebsitePage, fx.about_page)
            .await
            .unwrap();

        fx.directory.set_leaf_published(fx.about_page, false);
        let report = service
            .regenerate_leaf(ContentType::WebsitePage, fx.about_page)
            .await
            .unwrap();

        assert!(report.succeeded.is_empty());
        assert_eq!(report.invalidated, 2);
        assert!(store.all().iter().all(|s| !s.is_fresh()));
    }

    #[tokio::test]
    async fn test_regenerate_store_covers_published_leaves() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let report = service(&fx, &store).regenerate_store(fx.store).await.unwrap();

        // home, about, optin, thank-you on default and shop.example.com
        assert_eq!(report.succeeded.len(), 8);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_regenerate_domain_only_touches_that_domain() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let report = service(&fx, &store)
            .regenerate_domain(&host("www.shop.example.com"))
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 4);
        assert!(store.all().iter().all(|s| s.key.domain == Some(host(Fixture::SHOP_HOST))));
    }

    #[tokio::test]
    async fn test_render_preview_is_not_cached() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let service = service(&fx, &store);
        let content = service
            .resolver()
            .resolve(&host("pagesnap.app"), &format!("/website/{}/draft", fx.website))
            .await
            .unwrap();

        let (snapshot, source) = service.render(&content).await.unwrap();
        assert_eq!(source, SnapshotSource::Generated);
        assert!(snapshot.html.contains("noindex"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_root_marks_every_leaf() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let service = service(&fx, &store);
        service.regenerate_root(RootKind::Funnel, fx.funnel).await.unwrap();

        let count = service.invalidate_root(RootKind::Funnel, fx.funnel).await.unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_invalidate_domain_covers_connected_roots() {
        let fx = Fixture::shop();
        let store = InMemorySnapshotStore::new();
        let service = service(&fx, &store);
        service.regenerate_store(fx.store).await.unwrap();

        let count = service.invalidate_domain(&host("shop.example.com")).await.unwrap();
        assert_eq!(count, 8);
        assert!(store.all().iter().all(|s| !s.is_fresh()));

        let err = service.invalidate_domain(&host("pending.example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
