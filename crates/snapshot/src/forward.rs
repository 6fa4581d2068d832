//! Failing open to the origin application.
//!
//! When no snapshot can be served the request is replayed against the
//! origin and its answer is returned as-is, tagged `origin-fallback`. If the
//! path resolved, the `ContentRef` travels along as a hydration header so
//! the origin can skip its own resolution.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, header},
    response::Response,
};
use pagesnap_core::ContentRef;
use pagesnap_core::hydration::{self, HYDRATION_HEADER};
use tracing::{instrument, warn};

use crate::cache::SnapshotSource;
use crate::error::{AppError, Result};
use crate::middleware::REQUEST_ID_HEADER;
use crate::routes::SOURCE_HEADER;
use crate::state::AppState;

/// Headers that describe a single connection and are never copied.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Split `/path?query` so the query is not percent-encoded into the path.
fn split_query(path_and_query: &str) -> (&str, Option<&str>) {
    match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
        None => (path_and_query, None),
    }
}

/// Fetch `path` (which may carry a query string) from the origin as if requested on `domain`.
///
/// # Errors
///
/// [`AppError::Upstream`] when the origin cannot be reached.
#[instrument(skip(state, headers, content), fields(resolved = content.is_some()))]
pub async fn to_origin(
    state: &AppState,
    domain: &str,
    path: &str,
    headers: &HeaderMap,
    content: Option<&ContentRef>,
) -> Result<Response> {
    let (path, query) = split_query(path);
    let mut url = state.config().origin_url.clone();
    url.set_path(path);
    url.set_query(query);

    let mut request = state.http().get(url).header("x-forwarded-host", domain);
    for name in [header::USER_AGENT, HeaderName::from_static(REQUEST_ID_HEADER)] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value);
        }
    }
    if let Some(content) = content {
        match hydration::encode(content) {
            Ok(value) => request = request.header(HYDRATION_HEADER, value),
            Err(e) => warn!(error = %e, "Could not encode hydration header"),
        }
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let mut builder = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) && *name != SOURCE_HEADER {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(SOURCE_HEADER, SnapshotSource::OriginFallback.as_str());

    let body = upstream
        .bytes()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    builder
        .body(Body::from(body))
        .map_err(|e| AppError::Upstream(e.to_string()))
}
