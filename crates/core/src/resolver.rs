//! Content Identity Resolver: `(hostname, path)` to [`ContentRef`].
//!
//! The Snapshot Service, the Origin Application, the sitemap and the CLI all
//! call [`Resolver::resolve`]; none of them re-implement any part of it.
//!
//! # Rules
//!
//! 1. `/site/<websiteSlug>[/<pageSlug>]` resolves a website page; a missing
//!    page slug means the website's homepage.
//! 2. `/funnel/<funnelId>[/<stepSlug>]` resolves a funnel step; a missing
//!    step slug means the first step.
//! 3. `/website/<websiteId>[/<pageSlug>]` on a system domain is an editor
//!    preview: drafts resolve, and the reference is flagged `preview`.
//! 4. Any other path on a verified custom domain is resolved against the
//!    domain's connections using the last path segment as the slug. The
//!    empty path resolves through the homepage connection.
//! 5. Everything else is `unknown_route`.
//!
//! On a custom host the clean schemes (1, 2) only resolve content of the
//! store that owns that host.
//!
//! When several connections could answer a path, connections with a
//! matching path prefix are tried first (longest prefix wins), then
//! websites before funnels.

use std::cmp::Reverse;
use std::sync::Arc;

use thiserror::Error;

use crate::directory::{Directory, DirectoryError, find_verified_domain};
use crate::error::ErrorKind;
use crate::hosts::{HostKind, SystemDomains};
use crate::route::{HOMEPAGE_SLUG, Route};
use crate::types::{
    ContentRef, ContentRoot, CustomDomain, DomainConnection, Hostname, LeafSummary, RootId,
    RootKind, StoreId, normalize_path,
};

/// Why a request did not resolve to content.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no route matches {path}")]
    UnknownRoute { path: String },

    #[error("{host} is not a verified custom domain")]
    UnknownDomain { host: String },

    #[error("{host} has no connected content")]
    ContentNotConnected { host: Hostname },

    #[error("no published content at {path}")]
    ContentNotFound { path: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ResolveError {
    /// The taxonomy entry for this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRoute { .. } | Self::UnknownDomain { .. } => ErrorKind::UnknownRoute,
            Self::ContentNotConnected { .. } => ErrorKind::ContentNotConnected,
            Self::ContentNotFound { .. } => ErrorKind::ContentNotFound,
            Self::Directory(_) => ErrorKind::Unavailable,
        }
    }
}

/// Resolves requests against a [`Directory`].
#[derive(Clone)]
pub struct Resolver {
    directory: Arc<dyn Directory>,
    system: SystemDomains,
}

impl Resolver {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, system: SystemDomains) -> Self {
        Self { directory, system }
    }

    #[must_use]
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    #[must_use]
    pub const fn system_domains(&self) -> &SystemDomains {
        &self.system
    }

    #[must_use]
    pub fn host_kind(&self, host: &Hostname) -> HostKind {
        self.system.kind_of(host)
    }

    /// Resolve a raw `Host` header value and path.
    ///
    /// # Errors
    ///
    /// An unparseable host is `unknown_route`; otherwise see [`Self::resolve`].
    pub async fn resolve_raw(&self, host: &str, path: &str) -> Result<ContentRef, ResolveError> {
        let host = Hostname::parse(host).map_err(|_| ResolveError::UnknownDomain {
            host: host.to_string(),
        })?;
        self.resolve(&host, path).await
    }

    /// Resolve `(host, path)` to the content it addresses.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] naming why nothing was found; use
    /// [`ResolveError::kind`] to classify it.
    pub async fn resolve(&self, host: &Hostname, path: &str) -> Result<ContentRef, ResolveError> {
        let kind = self.host_kind(host);

        match Route::parse(host, kind, path) {
            Route::Site {
                website_slug,
                page_slug,
            } => {
                let root = self
                    .directory
                    .website_by_slug(&website_slug)
                    .await?
                    .filter(ContentRoot::is_public)
                    .ok_or_else(|| not_found(path))?;
                self.guard_tenant(host, kind, root.store_id, path).await?;
                self.resolve_in_root(&root, page_slug.as_deref(), false, None, path)
                    .await
            }
            Route::Funnel {
                funnel_id,
                step_slug,
            } => {
                let root = self
                    .public_root(RootKind::Funnel, funnel_id)
                    .await?
                    .ok_or_else(|| not_found(path))?;
                self.guard_tenant(host, kind, root.store_id, path).await?;
                self.resolve_in_root(&root, step_slug.as_deref(), false, None, path)
                    .await
            }
            Route::WebsitePreview {
                website_id,
                page_slug,
            } => {
                let root = self
                    .directory
                    .root(RootKind::Website, website_id)
                    .await?
                    .filter(|r| r.active)
                    .ok_or_else(|| not_found(path))?;
                self.resolve_in_root(&root, page_slug.as_deref(), true, None, path)
                    .await
            }
            Route::Custom { host, segments } => self.resolve_custom(&host, &segments, path).await,
            Route::Unknown => Err(ResolveError::UnknownRoute {
                path: normalize_path(path),
            }),
        }
    }

    /// Resolve, folding every failure into an `unknown` reference.
    pub async fn resolve_or_unknown(&self, host: &Hostname, path: &str) -> ContentRef {
        self.resolve(host, path)
            .await
            .unwrap_or_else(|_| ContentRef::unknown(path))
    }

    async fn resolve_custom(
        &self,
        host: &Hostname,
        segments: &[String],
        path: &str,
    ) -> Result<ContentRef, ResolveError> {
        let domain = find_verified_domain(self.directory.as_ref(), host)
            .await?
            .ok_or_else(|| ResolveError::UnknownDomain {
                host: host.to_string(),
            })?;
        self.ensure_store_active(domain.store_id, path).await?;

        let connections = ordered_connections(self.directory.connections(domain.id).await?);
        if connections.is_empty() {
            return Err(ResolveError::ContentNotConnected {
                host: domain.domain.clone(),
            });
        }

        if segments.is_empty() {
            let homepage = connections
                .iter()
                .find(|c| c.is_homepage)
                .or_else(|| match connections.as_slice() {
                    [only] => Some(only),
                    _ => None,
                })
                .ok_or_else(|| not_found(path))?;
            let root = self
                .public_root(homepage.root_kind, homepage.root_id)
                .await?
                .ok_or_else(|| not_found(path))?;
            return self
                .resolve_in_root(&root, None, false, Some(&domain), path)
                .await;
        }

        for connection in &connections {
            let Some(rest) = connection.strip_prefix(segments) else {
                continue;
            };
            let Some(root) = self
                .public_root(connection.root_kind, connection.root_id)
                .await?
            else {
                continue;
            };

            let slug = rest.last().map(String::as_str);
            match self
                .resolve_in_root(&root, slug, false, Some(&domain), path)
                .await
            {
                Ok(found) => return Ok(found),
                Err(ResolveError::ContentNotFound { .. }) => {}
                Err(other) => return Err(other),
            }
        }

        Err(not_found(path))
    }

    /// Find the leaf named `slug` (or the homepage) inside `root`.
    async fn resolve_in_root(
        &self,
        root: &ContentRoot,
        slug: Option<&str>,
        preview: bool,
        domain: Option<&CustomDomain>,
        path: &str,
    ) -> Result<ContentRef, ResolveError> {
        if !preview {
            self.ensure_store_active(root.store_id, path).await?;
        }

        let leaves: Vec<LeafSummary> = self
            .directory
            .leaves(root.kind, root.id)
            .await?
            .into_iter()
            .filter(|l| preview || l.published)
            .collect();

        let homepage = homepage_of(root.kind, &leaves);
        let leaf = match slug {
            None => homepage,
            Some(slug) => leaves
                .iter()
                .find(|l| l.slug.eq_ignore_ascii_case(slug))
                .or_else(|| {
                    (root.kind == RootKind::Website && slug == HOMEPAGE_SLUG)
                        .then_some(homepage)
                        .flatten()
                }),
        }
        .ok_or_else(|| not_found(path))?;

        Ok(ContentRef {
            content_type: root.kind.leaf_type(),
            store_id: Some(root.store_id),
            root_id: Some(root.id),
            leaf_id: Some(leaf.id),
            slug_path: format!("{}/{}", root.slug, leaf.slug),
            domain: domain.map(|d| d.domain.clone()),
            is_homepage: homepage.is_some_and(|h| h.id == leaf.id),
            preview,
        })
    }

    async fn public_root(
        &self,
        kind: RootKind,
        id: RootId,
    ) -> Result<Option<ContentRoot>, ResolveError> {
        Ok(self
            .directory
            .root(kind, id)
            .await?
            .filter(ContentRoot::is_public))
    }

    async fn ensure_store_active(&self, store: StoreId, path: &str) -> Result<(), ResolveError> {
        match self.directory.store(store).await? {
            Some(s) if s.active => Ok(()),
            _ => Err(not_found(path)),
        }
    }

    /// On a custom host, clean-scheme URLs may only reach the host owner's
    /// content.
    async fn guard_tenant(
        &self,
        host: &Hostname,
        kind: HostKind,
        owner: StoreId,
        path: &str,
    ) -> Result<(), ResolveError> {
        if kind == HostKind::System {
            return Ok(());
        }
        match find_verified_domain(self.directory.as_ref(), host).await? {
            Some(domain) if domain.store_id == owner => Ok(()),
            _ => Err(ResolveError::UnknownRoute {
                path: normalize_path(path),
            }),
        }
    }
}

/// The leaf `/` of a root resolves to.
///
/// Websites: the page flagged as homepage, else the page slugged `home`,
/// else the first page. Funnels: the first step.
#[must_use]
pub fn homepage_of(kind: RootKind, leaves: &[LeafSummary]) -> Option<&LeafSummary> {
    match kind {
        RootKind::Website => leaves
            .iter()
            .find(|l| l.is_homepage)
            .or_else(|| leaves.iter().find(|l| l.slug == HOMEPAGE_SLUG))
            .or_else(|| leaves.iter().min_by_key(|l| l.position)),
        RootKind::Funnel => leaves.iter().min_by_key(|l| l.position),
    }
}

/// Deterministic probe order for a domain's connections.
#[must_use]
pub fn ordered_connections(mut connections: Vec<DomainConnection>) -> Vec<DomainConnection> {
    connections.sort_by_key(|c| (Reverse(c.prefix_segments().len()), c.root_kind, c.id));
    connections
}

fn not_found(path: &str) -> ResolveError {
    ResolveError::ContentNotFound {
        path: normalize_path(path),
    }
}
