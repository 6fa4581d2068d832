//! Pagesnap Origin Application library.
//!
//! Serves the interactive shell to humans. Content is identified with the
//! shared resolver from `pagesnap-core`, or taken from a hydration
//! descriptor when the snapshot service forwarded one.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod hydration;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use config::OriginConfig;
pub use hydration::{Landing, Provenance, land};
pub use state::AppState;

/// Build the router with tracing and request-id middleware.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new().merge(routes::routes());

    let config = state.config();
    if let Some(dir) = &config.asset_dir
        && config.asset_base.len() > 1
        && config.asset_base.starts_with('/')
    {
        router = router.nest_service(&config.asset_base, ServeDir::new(dir));
    }

    router
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
