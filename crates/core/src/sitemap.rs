//! Sitemap enumeration.
//!
//! Candidate URLs come from [`crate::urls`]; each is then fed back through
//! the [`Resolver`] and only kept if it resolves to the leaf it was built
//! from. A sitemap entry and the snapshot served for it can therefore never
//! disagree.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::find_verified_domain;
use crate::resolver::{ResolveError, Resolver, homepage_of, ordered_connections};
use crate::types::{ContentRoot, Hostname, LeafSummary, RootId, RootKind};
use crate::urls;

/// One `<url>` of a sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: DateTime<Utc>,
}

/// What a sitemap covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapScope {
    /// Everything reachable on a verified custom domain.
    Domain(Hostname),
    /// A website on the system domain, by slug.
    Website(String),
    /// A funnel on the system domain, by id.
    Funnel(RootId),
}

/// Enumerate the published URLs of `scope`.
///
/// `platform_url` is the public base of the system domain, e.g.
/// `https://pagesnap.app`.
///
/// # Errors
///
/// Unknown domains and missing or unpublished roots are reported the same
/// way the resolver reports them.
pub async fn entries(
    resolver: &Resolver,
    scope: &SitemapScope,
    platform_url: &str,
) -> Result<Vec<SitemapEntry>, ResolveError> {
    match scope {
        SitemapScope::Domain(host) => domain_entries(resolver, host).await,
        SitemapScope::Website(slug) => {
            let root = resolver
                .directory()
                .website_by_slug(&slug.to_ascii_lowercase())
                .await?
                .filter(ContentRoot::is_public)
                .ok_or_else(|| ResolveError::ContentNotFound {
                    path: format!("/site/{slug}"),
                })?;
            system_entries(resolver, &root, platform_url).await
        }
        SitemapScope::Funnel(id) => {
            let root = resolver
                .directory()
                .root(RootKind::Funnel, *id)
                .await?
                .filter(ContentRoot::is_public)
                .ok_or_else(|| ResolveError::ContentNotFound {
                    path: format!("/funnel/{id}"),
                })?;
            system_entries(resolver, &root, platform_url).await
        }
    }
}

async fn domain_entries(
    resolver: &Resolver,
    host: &Hostname,
) -> Result<Vec<SitemapEntry>, ResolveError> {
    let domain = find_verified_domain(resolver.directory(), host)
        .await?
        .ok_or_else(|| ResolveError::UnknownDomain {
            host: host.to_string(),
        })?;
    let base = urls::domain_base(domain.domain.as_str());

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for connection in ordered_connections(resolver.directory().connections(domain.id).await?) {
        let Some(root) = resolver
            .directory()
            .root(connection.root_kind, connection.root_id)
            .await?
            .filter(ContentRoot::is_public)
        else {
            continue;
        };
        let leaves = published_leaves(resolver, &root).await?;
        let homepage = homepage_of(root.kind, &leaves).map(|l| l.id);

        for leaf in &leaves {
            let path = urls::custom_path(&connection, leaf, homepage == Some(leaf.id));
            if !resolves_to(resolver, &domain.domain, &path, leaf).await? {
                continue;
            }
            let loc = urls::absolute(&base, &path);
            if seen.insert(loc.clone()) {
                out.push(SitemapEntry {
                    loc,
                    lastmod: leaf.updated_at,
                });
            }
        }
    }
    Ok(out)
}

async fn system_entries(
    resolver: &Resolver,
    root: &ContentRoot,
    platform_url: &str,
) -> Result<Vec<SitemapEntry>, ResolveError> {
    let leaves = published_leaves(resolver, root).await?;
    let homepage = homepage_of(root.kind, &leaves).map(|l| l.id);
    let probe_host = resolver.system_domains().primary().cloned();

    let mut out = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        let path = urls::system_path(root, leaf, homepage == Some(leaf.id));
        if let Some(host) = &probe_host
            && !resolves_to(resolver, host, &path, leaf).await?
        {
            continue;
        }
        out.push(SitemapEntry {
            loc: urls::absolute(platform_url, &path),
            lastmod: leaf.updated_at,
        });
    }
    Ok(out)
}

async fn published_leaves(
    resolver: &Resolver,
    root: &ContentRoot,
) -> Result<Vec<LeafSummary>, ResolveError> {
    Ok(resolver
        .directory()
        .leaves(root.kind, root.id)
        .await?
        .into_iter()
        .filter(|l| l.published)
        .collect())
}

async fn resolves_to(
    resolver: &Resolver,
    host: &Hostname,
    path: &str,
    leaf: &LeafSummary,
) -> Result<bool, ResolveError> {
    match resolver.resolve(host, path).await {
        Ok(found) => Ok(found.leaf_id == Some(leaf.id)),
        Err(ResolveError::Directory(e)) => Err(e.into()),
        Err(_) => Ok(false),
    }
}
