//! Read-only access to the tenant/domain directory.
//!
//! The directory is an external collaborator (a persisted store). The
//! resolver, the edge's domain check, the sitemap and the snapshot pipeline
//! all read through this trait, so every tier sees the same data model
//! whether it is backed by `PostgreSQL` or by memory in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    ContentLeaf, ContentRoot, ContentType, CustomDomain, DomainConnection, DomainId, Hostname,
    LeafId, LeafSummary, RootId, RootKind, Store, StoreId,
};

/// Errors surfaced by a [`Directory`] implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing store could not be reached or the query failed.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped onto the model.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Lookup tables mapping hostnames and slugs to content.
#[async_trait]
pub trait Directory: Send + Sync {
    /// A store by id.
    async fn store(&self, id: StoreId) -> Result<Option<Store>, DirectoryError>;

    /// A DNS-verified custom domain by exact hostname. Unverified domains
    /// are never returned.
    async fn verified_domain(&self, host: &Hostname)
    -> Result<Option<CustomDomain>, DirectoryError>;

    /// Every connection of a domain.
    async fn connections(&self, domain: DomainId)
    -> Result<Vec<DomainConnection>, DirectoryError>;

    /// Verified domains with a connection to the given root, paired with that
    /// connection.
    async fn domains_for_root(
        &self,
        kind: RootKind,
        root: RootId,
    ) -> Result<Vec<(CustomDomain, DomainConnection)>, DirectoryError>;

    /// A website or funnel by id.
    async fn root(&self, kind: RootKind, id: RootId) -> Result<Option<ContentRoot>, DirectoryError>;

    /// A website by its platform-wide slug.
    async fn website_by_slug(&self, slug: &str) -> Result<Option<ContentRoot>, DirectoryError>;

    /// Every website and funnel owned by a store.
    async fn roots_for_store(&self, store: StoreId) -> Result<Vec<ContentRoot>, DirectoryError>;

    /// Routing summaries of a root's leaves, ordered by position.
    async fn leaves(&self, kind: RootKind, root: RootId)
    -> Result<Vec<LeafSummary>, DirectoryError>;

    /// A single leaf with SEO fields and document.
    async fn leaf(
        &self,
        content_type: ContentType,
        id: LeafId,
    ) -> Result<Option<ContentLeaf>, DirectoryError>;

    /// Cheap health probe.
    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

/// Look a host up, falling back to its `www.`-toggled twin.
///
/// # Errors
///
/// Propagates directory failures.
pub async fn find_verified_domain(
    directory: &dyn Directory,
    host: &Hostname,
) -> Result<Option<CustomDomain>, DirectoryError> {
    if let Some(domain) = directory.verified_domain(host).await? {
        return Ok(Some(domain));
    }
    directory.verified_domain(&host.www_toggled()).await
}
