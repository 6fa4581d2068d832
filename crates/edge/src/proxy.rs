//! Upstream calls: the snapshot service and the origin application.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::Response,
};
use pagesnap_core::Hostname;
use pagesnap_core::hydration::HYDRATION_HEADER;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::EdgeConfig;
use crate::dispatch::SitemapTarget;
use crate::middleware::REQUEST_ID_HEADER;

/// Largest request body forwarded to the origin.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

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
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The snapshot service answered with a status a crawler must not see.
    #[error("upstream answered {0}")]
    Rejected(StatusCode),

    #[error("request body exceeds {MAX_BODY_BYTES} bytes")]
    BodyTooLarge,

    #[error("invalid upstream response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Headers only this proxy or the snapshot service may set on an origin
/// request. Client-supplied values are dropped.
const INTERNAL: &[&str] = &[HYDRATION_HEADER, "x-forwarded-host", "x-forwarded-proto"];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Whether an inbound client header is copied onto the origin request.
fn is_forwardable(name: &HeaderName) -> bool {
    !is_hop_by_hop(name)
        && !INTERNAL.contains(&name.as_str())
        && *name != header::HOST
        && *name != header::CONTENT_LENGTH
}

/// Whether a snapshot-service status may be passed to a crawler verbatim.
///
/// Redirects and partial content are never shown to crawlers; server
/// errors fall back to the origin.
#[must_use]
pub fn passes_through(status: StatusCode) -> bool {
    (status.is_success() && status != StatusCode::PARTIAL_CONTENT) || status == StatusCode::NOT_FOUND
}

/// HTTP client for both upstreams.
#[derive(Clone)]
pub struct Proxy {
    http: reqwest::Client,
    snapshot_url: Url,
    origin_url: Url,
}

impl Proxy {
    /// Build the client. Redirects are never followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &EdgeConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            snapshot_url: config.snapshot_url.clone(),
            origin_url: config.origin_url.clone(),
        })
    }

    /// Ask the snapshot service for `path` on `host`.
    ///
    /// # Errors
    ///
    /// Any network failure or a status that must not reach a crawler; the
    /// caller falls back to the origin.
    #[instrument(skip(self, headers), fields(host = %host))]
    pub async fn snapshot(
        &self,
        host: &Hostname,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Response, ProxyError> {
        let mut url = self.snapshot_url.clone();
        url.set_path("/snapshot");
        url.query_pairs_mut()
            .append_pair("domain", host.as_str())
            .append_pair("path", path);
        self.fetch_verbatim(url, headers).await
    }

    /// Ask the snapshot service for a sitemap.
    ///
    /// # Errors
    ///
    /// See [`Self::snapshot`].
    #[instrument(skip(self, headers))]
    pub async fn sitemap(
        &self,
        target: &SitemapTarget,
        headers: &HeaderMap,
    ) -> Result<Response, ProxyError> {
        let mut url = self.snapshot_url.clone();
        url.set_path("/sitemap.xml");
        let (key, value) = target.query();
        url.query_pairs_mut().append_pair(key, value);
        self.fetch_verbatim(url, headers).await
    }

    async fn fetch_verbatim(&self, url: Url, headers: &HeaderMap) -> Result<Response, ProxyError> {
        let mut request = self.http.get(url);
        for name in [header::USER_AGENT, HeaderName::from_static(REQUEST_ID_HEADER)] {
            if let Some(value) = headers.get(&name) {
                request = request.header(name, value);
            }
        }

        let upstream = request.send().await?;
        let status = upstream.status();
        if !passes_through(status) {
            return Err(ProxyError::Rejected(status));
        }
        into_response(upstream)
    }

    /// Forward a request to the origin unchanged: method, path, query,
    /// headers and body. `host` becomes `x-forwarded-host`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::BodyTooLarge`] or a network failure.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn origin(&self, request: Request, host: &str) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        let mut url = self.origin_url.clone();
        url.set_path(parts.uri.path());
        url.set_query(parts.uri.query());

        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|_| ProxyError::BodyTooLarge)?;

        let proto = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http")
            .to_string();

        let mut upstream = self.http.request(parts.method, url);
        for (name, value) in &parts.headers {
            if is_forwardable(name) {
                upstream = upstream.header(name, value);
            }
        }
        upstream = upstream
            .header("x-forwarded-host", host)
            .header("x-forwarded-proto", proto)
            .body(body);

        into_response(upstream.send().await?)
    }
}

/// Stream an upstream response back, minus hop-by-hop headers.
fn into_response(upstream: reqwest::Response) -> Result<Response, ProxyError> {
    let mut builder = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            builder = builder.header(name, value);
        }
    }
    Ok(builder.body(Body::from_stream(upstream.bytes_stream()))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through() {
        assert!(passes_through(StatusCode::OK));
        assert!(passes_through(StatusCode::NOT_FOUND));
        assert!(!passes_through(StatusCode::PARTIAL_CONTENT));
        assert!(!passes_through(StatusCode::FOUND));
        assert!(!passes_through(StatusCode::MOVED_PERMANENTLY));
        assert!(!passes_through(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!passes_through(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&header::UPGRADE));
        assert!(!is_hop_by_hop(&header::COOKIE));
    }

    #[test]
    fn test_internal_headers_are_not_forwarded() {
        assert!(!is_forwardable(&HeaderName::from_static(HYDRATION_HEADER)));
        assert!(!is_forwardable(&HeaderName::from_static("x-forwarded-host")));
        assert!(!is_forwardable(&header::HOST));
        assert!(is_forwardable(&header::COOKIE));
        assert!(is_forwardable(&header::USER_AGENT));
    }
}
