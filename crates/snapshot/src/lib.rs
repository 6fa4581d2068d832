//! Pagesnap Snapshot Service library.
//!
//! Serves pre-rendered HTML to crawlers. The binary in `main.rs` wires the
//! `PostgreSQL` directory and snapshot store into [`app`]; tests wire the
//! in-memory ones.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod forward;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod service;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use cache::{SnapshotCache, SnapshotSource};
pub use config::SnapshotConfig;
pub use events::{ContentEvent, EventOutcome};
pub use pipeline::{GenerationError, Generator};
pub use service::{RegenerationReport, SnapshotService};
pub use state::AppState;

/// Build the router with tracing and request-id middleware.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
