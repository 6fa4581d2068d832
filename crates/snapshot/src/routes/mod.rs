//! HTTP route handlers for the snapshot service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /snapshot?domain=&path=           - Crawler HTML for a request
//! GET  /sitemap.xml?domain=|website=|funnel= - Sitemap for a domain or root
//! POST /admin/events                     - Content events (bearer token)
//! GET  /health                           - Liveness
//! GET  /health/ready                     - Directory and store reachability
//! ```

pub mod admin;
pub mod health;
pub mod sitemap;
pub mod snapshot;

use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};

use crate::state::AppState;

/// Diagnostic header naming the code path that answered.
pub const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-snapshot-source");

/// Create the service router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/snapshot", get(snapshot::snapshot))
        .route("/sitemap.xml", get(sitemap::sitemap))
        .route("/admin/events", post(admin::events))
}
