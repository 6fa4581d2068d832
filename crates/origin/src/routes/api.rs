//! Content reference API for client-side navigation.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use pagesnap_core::{ContentRef, Hostname, ResolveError};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::routes::public_host;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContentRefQuery {
    pub domain: Option<String>,
    pub path: Option<String>,
}

/// Resolve a path the browser navigated to.
///
/// Answers with the same reference the snapshot service would compute.
/// Misses answer 404 with an `unknown` reference so the client can render
/// its not-found view.
///
/// # Errors
///
/// Returns an error if the directory is unreachable.
#[instrument(skip(state, headers))]
pub async fn content_ref(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ContentRefQuery>,
) -> Result<Response> {
    let path = query.path.unwrap_or_else(|| "/".to_string());
    let host = match query.domain.as_deref() {
        Some(domain) => Hostname::parse(domain).ok(),
        None => public_host(&headers),
    };
    let Some(host) = host else {
        return Ok((StatusCode::NOT_FOUND, Json(ContentRef::unknown(&path))).into_response());
    };

    match state.resolver().resolve(&host, &path).await {
        Ok(content) => Ok(Json(content).into_response()),
        Err(ResolveError::Directory(e)) => Err(AppError::Directory(e)),
        Err(_) => Ok((StatusCode::NOT_FOUND, Json(ContentRef::unknown(&path))).into_response()),
    }
}
