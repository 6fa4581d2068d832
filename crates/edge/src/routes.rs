//! Route handlers for the edge dispatcher.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Liveness probe
//! GET  /health/ready    - Readiness probe (directory reachable)
//! *    /*               - Dispatch: snapshot, sitemap or origin
//! ```
//!
//! Every other request, on any host and with any method, goes through
//! [`dispatch`].

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
    routing::get,
};
use pagesnap_core::{HostKind, Hostname, classify};
use tracing::{Span, warn};

use crate::dispatch::{Decision, RequestFacts, decide};
use crate::error::Result;
use crate::state::AppState;

/// Diagnostic header naming the path a request took through the edge.
pub const ROUTE_HEADER: HeaderName = HeaderName::from_static("x-pagesnap-route");

/// Create the edge router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .fallback(dispatch)
}

/// Liveness health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// The edge itself only depends on the directory, for domain verification.
/// Upstream outages are handled per request.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.domains().directory().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// The inbound host: the `Host` header, or the authority of an absolute URI.
fn raw_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().host().map(str::to_string))
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Route one request.
///
/// Snapshot and sitemap failures are never shown to the client: the
/// request is forwarded to the origin instead, exactly as a human request
/// would be.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Result<Response> {
    let raw = raw_host(&request).unwrap_or_default();
    let Ok(host) = Hostname::parse(&raw) else {
        return forward(&state, request, &raw, Decision::Origin).await;
    };

    let client = classify(user_agent(request.headers()));
    let host_kind = state.system_domains().kind_of(&host);
    let verified = host_kind == HostKind::Custom && state.domains().is_verified(&host).await;
    let path = request.uri().path().to_string();

    let decision = decide(&RequestFacts {
        method: request.method(),
        host: &host,
        host_kind,
        verified,
        path: &path,
        client,
    });

    let span = Span::current();
    span.record("host", host.as_str());
    span.record("crawler", client.is_crawler);
    span.record("route", decision.as_str());

    let upstream = match &decision {
        Decision::Snapshot => {
            let path_and_query = request
                .uri()
                .path_and_query()
                .map_or(path.as_str(), |pq| pq.as_str());
            Some(
                state
                    .proxy()
                    .snapshot(&host, path_and_query, request.headers())
                    .await,
            )
        }
        Decision::Sitemap(target) => Some(state.proxy().sitemap(target, request.headers()).await),
        Decision::Origin => None,
    };

    match upstream {
        Some(Ok(response)) => Ok(tag(response, &decision)),
        Some(Err(e)) => {
            warn!(
                error = %e,
                route = decision.as_str(),
                host = %host,
                "Snapshot service unavailable, falling back to origin"
            );
            forward(&state, request, host.as_str(), Decision::Origin).await
        }
        None => forward(&state, request, host.as_str(), Decision::Origin).await,
    }
}

async fn forward(state: &AppState, request: Request, host: &str, decision: Decision) -> Result<Response> {
    let response = state.proxy().origin(request, host).await?;
    Ok(tag(response, &decision))
}

fn tag(mut response: Response, decision: &Decision) -> Response {
    response
        .headers_mut()
        .insert(ROUTE_HEADER, HeaderValue::from_static(decision.as_str()));
    response
}
