//! Deciding what the application shell shows for a request.
//!
//! Three sources, in order:
//! 1. A hydration descriptor forwarded by the snapshot service. It is taken
//!    out of its slot once, then checked against the directory. It must name
//!    published, non-preview content owned by the request host's store;
//!    anything else is stale.
//! 2. A preview URL with no descriptor is redirected to the snapshot
//!    service, which renders drafts.
//! 3. Otherwise the request is resolved here with the shared resolver.

use axum::http::HeaderMap;
use pagesnap_core::hydration::{HYDRATION_HEADER, HydrationSlot};
use pagesnap_core::{
    ContentLeaf, ContentRef, ContentRoot, ErrorKind, HostKind, Hostname, ResolveError, Route,
    find_verified_domain,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// How the content reference was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Taken from the forwarded hydration descriptor.
    Hydrated,
    /// Resolved by this tier.
    Resolved,
}

/// What to answer.
#[derive(Debug, Clone)]
pub enum Landing {
    /// Render the shell for existing content.
    Content {
        content: ContentRef,
        title: String,
        provenance: Provenance,
    },
    /// Send the browser to the snapshot service.
    Redirect(Url),
    /// Render the not-found shell.
    NotFound(ErrorKind),
}

/// Pick the answer for `path` on `host`.
///
/// # Errors
///
/// Only directory outages; every content miss is a [`Landing::NotFound`].
#[instrument(skip(state, headers), fields(host = %host))]
pub async fn land(
    state: &AppState,
    host: &Hostname,
    path: &str,
    headers: &HeaderMap,
) -> Result<Landing> {
    let mut slot = HydrationSlot::from_header(
        headers.get(HYDRATION_HEADER).and_then(|v| v.to_str().ok()),
    );

    if let Some(content) = slot.take() {
        return hydrate(state, host, content).await;
    }

    let kind = state.resolver().host_kind(host);
    if Route::parse(host, kind, path).is_preview() {
        return Ok(Landing::Redirect(preview_url(state, host, path)));
    }

    match state.resolver().resolve(host, path).await {
        Ok(content) => {
            let title = title_of(state, &content).await?;
            Ok(Landing::Content {
                content,
                title,
                provenance: Provenance::Resolved,
            })
        }
        Err(ResolveError::Directory(e)) => Err(AppError::Directory(e)),
        Err(e) => {
            debug!(kind = %e.kind(), error = %e, "No content for request");
            Ok(Landing::NotFound(e.kind()))
        }
    }
}

async fn hydrate(state: &AppState, host: &Hostname, content: ContentRef) -> Result<Landing> {
    if let Some(leaf) = reachable_leaf(state, host, &content).await? {
        return Ok(Landing::Content {
            content,
            title: leaf.name,
            provenance: Provenance::Hydrated,
        });
    }
    warn!(
        kind = %ErrorKind::StaleHydration,
        slug_path = %content.slug_path,
        "Hydration descriptor does not match public content on this host"
    );
    Ok(Landing::NotFound(ErrorKind::UnknownRoute))
}

/// The leaf a descriptor names, if it is public content that `host` may
/// serve. Previews are never hydrated.
async fn reachable_leaf(
    state: &AppState,
    host: &Hostname,
    content: &ContentRef,
) -> Result<Option<ContentLeaf>> {
    let (Some(id), Some(kind), false) = (
        content.leaf_id,
        content.content_type.root_kind(),
        content.preview,
    ) else {
        return Ok(None);
    };
    let directory = state.resolver().directory();

    let Some(leaf) = directory
        .leaf(content.content_type, id)
        .await?
        .filter(|l| l.summary.published && content.root_id == Some(l.summary.root_id))
    else {
        return Ok(None);
    };
    let Some(root) = directory
        .root(kind, leaf.summary.root_id)
        .await?
        .filter(|r| r.is_public() && content.store_id == Some(r.store_id))
    else {
        return Ok(None);
    };
    if !directory
        .store(root.store_id)
        .await?
        .is_some_and(|s| s.active)
    {
        return Ok(None);
    }

    let reachable = match state.resolver().host_kind(host) {
        HostKind::System => content.domain.is_none(),
        HostKind::Custom => owns(state, host, content, &root).await?,
    };
    Ok(reachable.then_some(leaf))
}

async fn owns(
    state: &AppState,
    host: &Hostname,
    content: &ContentRef,
    root: &ContentRoot,
) -> Result<bool> {
    let domain = find_verified_domain(state.resolver().directory(), host).await?;
    Ok(domain.is_some_and(|d| {
        d.store_id == root.store_id && content.domain.as_ref() == Some(&d.domain)
    }))
}

async fn title_of(state: &AppState, content: &ContentRef) -> Result<String> {
    let Some(id) = content.leaf_id else {
        return Ok(content.slug_path.clone());
    };
    let leaf = state
        .resolver()
        .directory()
        .leaf(content.content_type, id)
        .await?;
    Ok(leaf.map_or_else(|| content.slug_path.clone(), |l| l.name))
}

/// The snapshot service URL that renders `path` on `host`.
#[must_use]
pub fn preview_url(state: &AppState, host: &Hostname, path: &str) -> Url {
    let mut url = state.config().snapshot_url.clone();
    url.set_path("/snapshot");
    url.query_pairs_mut()
        .append_pair("domain", host.as_str())
        .append_pair("path", path);
    url
}

/// Serialize a reference for embedding inside a `<script>` element.
///
/// # Errors
///
/// Fails only if the reference cannot be serialized.
pub fn embed(content: &ContentRef) -> std::result::Result<String, serde_json::Error> {
    Ok(content
        .to_canonical_json()?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use pagesnap_core::hydration::encode;
    use pagesnap_core::memory::Fixture;
    use pagesnap_core::{ContentType, LeafId};

    use super::*;
    use crate::config::test_config;

    fn state(fx: &Fixture) -> AppState {
        AppState::new(test_config(), Arc::new(fx.directory.clone()))
    }

    fn host(s: &str) -> Hostname {
        Hostname::parse(s).unwrap()
    }

    fn hydration_headers(content: &ContentRef) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HYDRATION_HEADER,
            HeaderValue::from_str(&encode(content).unwrap()).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_resolves_without_descriptor() {
        let fx = Fixture::shop();
        let landing = land(&state(&fx), &host("shop.example.com"), "/about", &HeaderMap::new())
            .await
            .unwrap();
        match landing {
            Landing::Content {
                content,
                provenance,
                ..
            } => {
                assert_eq!(content.leaf_id, Some(fx.about_page));
                assert_eq!(provenance, Provenance::Resolved);
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_descriptor_skips_resolution() {
        let fx = Fixture::shop();
        let state = state(&fx);
        let content = state
            .resolver()
            .resolve(&host("shop.example.com"), "/about")
            .await
            .unwrap();

        // The path is deliberately unresolvable: the descriptor wins.
        let landing = land(&state, &host("shop.example.com"), "/nowhere", &hydration_headers(&content))
            .await
            .unwrap();
        assert!(matches!(
            landing,
            Landing::Content {
                provenance: Provenance::Hydrated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stale_descriptor_is_unknown_route() {
        let fx = Fixture::shop();
        let mut content = ContentRef::unknown("/gone");
        content.content_type = ContentType::WebsitePage;
        content.leaf_id = Some(LeafId::random());

        let landing = land(&state(&fx), &host("shop.example.com"), "/gone", &hydration_headers(&content))
            .await
            .unwrap();
        assert!(matches!(landing, Landing::NotFound(ErrorKind::UnknownRoute)));
    }

    #[tokio::test]
    async fn test_unpublished_descriptor_is_stale() {
        let fx = Fixture::shop();
        let state = state(&fx);
        let content = state
            .resolver()
            .resolve(&host("shop.example.com"), "/about")
            .await
            .unwrap();
        fx.directory.set_leaf_published(fx.about_page, false);

        let landing = land(&state, &host("shop.example.com"), "/about", &hydration_headers(&content))
            .await
            .unwrap();
        assert!(matches!(landing, Landing::NotFound(_)));
    }

    #[tokio::test]
    async fn test_descriptor_for_another_domain_is_stale() {
        let fx = Fixture::shop();
        let state = state(&fx);
        let content = state
            .resolver()
            .resolve(&host("shop.example.com"), "/about")
            .await
            .unwrap();

        // Same store, but reached on the system domain the descriptor does not name.
        let landing = land(&state, &host("pagesnap.app"), "/about", &hydration_headers(&content))
            .await
            .unwrap();
        assert!(matches!(landing, Landing::NotFound(ErrorKind::UnknownRoute)));
    }

    #[tokio::test]
    async fn test_descriptor_is_accepted_on_www_twin() {
        let fx = Fixture::shop();
        let state = state(&fx);
        let content = state
            .resolver()
            .resolve(&host("shop.example.com"), "/about")
            .await
            .unwrap();

        let landing = land(&state, &host("www.shop.example.com"), "/about", &hydration_headers(&content))
            .await
            .unwrap();
        assert!(matches!(
            landing,
            Landing::Content {
                provenance: Provenance::Hydrated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_descriptor_falls_back_to_resolution() {
        let fx = Fixture::shop();
        let mut headers = HeaderMap::new();
        headers.insert(HYDRATION_HEADER, HeaderValue::from_static("%%%"));
        let landing = land(&state(&fx), &host("shop.example.com"), "/about", &headers)
            .await
            .unwrap();
        assert!(matches!(
            landing,
            Landing::Content {
                provenance: Provenance::Resolved,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_preview_without_descriptor_redirects() {
        let fx = Fixture::shop();
        let path = format!("/website/{}/draft", fx.website);
        let landing = land(&state(&fx), &host("pagesnap.app"), &path, &HeaderMap::new())
            .await
            .unwrap();
        let Landing::Redirect(url) = landing else {
            panic!("expected redirect");
        };
        assert_eq!(url.path(), "/snapshot");
        assert!(url.as_str().starts_with("https://snap.pagesnap.app/snapshot?domain=pagesnap.app&path=%2Fwebsite%2F"));
    }

    #[tokio::test]
    async fn test_unconnected_domain_keeps_its_kind() {
        let fx = Fixture::shop();
        let landing = land(&state(&fx), &host("empty.example.com"), "/", &HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(landing, Landing::NotFound(ErrorKind::ContentNotConnected)));
    }

    #[test]
    fn test_embed_escapes_script_breakers() {
        let content = ContentRef::unknown("/</script><b>&");
        let json = embed(&content).unwrap();
        assert!(!json.contains('<'));
        assert!(!json.contains('&'));
        assert!(json.contains("\\u003c/script\\u003e"));
    }
}
