//! HTTP route handlers for the origin application.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/content-ref?domain=&path=  - Client-side re-resolution
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Directory reachability
//! GET  /*                              - Application shell
//! ```

pub mod api;
pub mod health;
pub mod shell;

use axum::{Router, http::HeaderMap, routing::get};
use pagesnap_core::Hostname;

use crate::state::AppState;

/// Create the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/content-ref", get(api::content_ref))
        .fallback(shell::shell)
}

/// The public host a request was made on.
///
/// Behind the edge, `Host` names the origin itself; the edge and the
/// snapshot service pass the public host in `x-forwarded-host`.
pub(crate) fn public_host(headers: &HeaderMap) -> Option<Hostname> {
    ["x-forwarded-host", "host"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| Hostname::parse(v).ok())
}
