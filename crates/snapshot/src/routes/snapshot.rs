//! `GET /snapshot`: the crawler path.
//!
//! Never answers with a 5xx of its own. Anything that cannot be served from
//! a snapshot is replayed against the origin.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use pagesnap_core::{ContentRef, Hostname, Snapshot};
use serde::Deserialize;
use tracing::{Span, debug, instrument, warn};

use super::SOURCE_HEADER;
use crate::cache::SnapshotSource;
use crate::forward;
use crate::state::AppState;

const CACHE_CONTROL_PUBLIC: &str = "public, max-age=300";
const CACHE_CONTROL_PREVIEW: &str = "no-store";

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Request hostname; the primary system domain when absent.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Serve a snapshot, falling back to the origin.
#[instrument(skip_all, fields(domain = tracing::field::Empty, path = tracing::field::Empty, source = tracing::field::Empty))]
pub async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
    headers: HeaderMap,
) -> Response {
    let path = query
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .map_or_else(|| "/".to_string(), |p| {
            if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{p}")
            }
        });

    let host = match query.domain.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Hostname::parse(raw).ok(),
        None => state.config().system_domains.primary().cloned(),
    };
    let domain = host.as_ref().map_or_else(
        || query.domain.clone().unwrap_or_default(),
        |h| h.as_str().to_string(),
    );

    Span::current().record("domain", domain.as_str());
    Span::current().record("path", path.as_str());

    let resolved = match &host {
        Some(host) => state.service().resolver().resolve(host, &path).await,
        None => {
            debug!("Unparseable domain, failing open");
            return fail_open(&state, &domain, &path, &headers, None).await;
        }
    };

    let content = match resolved {
        Ok(content) => content,
        Err(e) => {
            debug!(kind = %e.kind(), error = %e, "Not resolvable, failing open");
            return fail_open(&state, &domain, &path, &headers, None).await;
        }
    };

    match state.service().render(&content).await {
        Ok((snapshot, source)) => {
            Span::current().record("source", source.as_str());
            html(&snapshot, source, content.preview)
        }
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "No snapshot available, failing open");
            fail_open(&state, &domain, &path, &headers, Some(&content)).await
        }
    }
}

fn html(snapshot: &Snapshot, source: SnapshotSource, preview: bool) -> Response {
    let cache_control = if preview {
        CACHE_CONTROL_PREVIEW
    } else {
        CACHE_CONTROL_PUBLIC
    };
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, cache_control),
            (SOURCE_HEADER, source.as_str()),
        ],
        snapshot.html.clone(),
    )
        .into_response()
}

async fn fail_open(
    state: &AppState,
    domain: &str,
    path: &str,
    headers: &HeaderMap,
    content: Option<&ContentRef>,
) -> Response {
    forward::to_origin(state, domain, path, headers, content)
        .await
        .into_response()
}
