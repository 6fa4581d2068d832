//! Health check endpoints.

use axum::{extract::State, http::StatusCode};
use tracing::warn;

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable unless both the directory and the
/// snapshot store answer.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let service = state.service();
    let directory = service.resolver().directory().ping().await;
    let store = service.cache().store().ping().await;

    match (directory, store) {
        (Ok(()), Ok(())) => StatusCode::OK,
        (directory, store) => {
            warn!(
                directory = ?directory.err(),
                store = ?store.err(),
                "Readiness check failed"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
