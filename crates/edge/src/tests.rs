//! Router tests against stub upstreams on loopback ports.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::Query,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pagesnap_core::Hostname;
use pagesnap_core::hydration::HYDRATION_HEADER;
use pagesnap_core::memory::Fixture;
use tower::ServiceExt;
use url::Url;

use crate::config::test_config;
use crate::{AppState, app};

const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
const CHROME: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Verified domains whose snapshots misbehave in the stub.
const BROKEN_HOST: &str = "broken.example.com";
const PARTIAL_HOST: &str = "partial.example.com";
const REDIRECT_HOST: &str = "redirect.example.com";

async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

async fn stub_snapshot(Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    let domain = query.get("domain").cloned().unwrap_or_default();
    let path = query.get("path").cloned().unwrap_or_default();
    let ua = headers.contains_key(header::USER_AGENT);
    match domain.as_str() {
        BROKEN_HOST => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        PARTIAL_HOST => (StatusCode::PARTIAL_CONTENT, "half").into_response(),
        REDIRECT_HOST => (StatusCode::FOUND, [(header::LOCATION, "https://elsewhere.example/")]).into_response(),
        _ => (
            [("x-snapshot-source", "generated")],
            format!("snapshot domain={domain} path={path} ua={ua}"),
        )
            .into_response(),
    }
}

async fn stub_sitemap(Query(query): Query<HashMap<String, String>>) -> Response {
    match (query.get("domain"), query.get("website")) {
        (_, Some(slug)) if slug == "nope" => StatusCode::NOT_FOUND.into_response(),
        (Some(domain), _) => format!("sitemap domain={domain}").into_response(),
        (_, Some(slug)) => format!("sitemap website={slug}").into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Describes what the origin received.
async fn stub_origin(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> String {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    format!(
        "origin {method} {} host={} proto={} req={} body={} hydration={}",
        uri.path_and_query().map_or("", |pq| pq.as_str()),
        headers
            .get_all("x-forwarded-host")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(","),
        value("x-forwarded-proto"),
        value("x-request-id"),
        String::from_utf8_lossy(&body),
        headers.contains_key(HYDRATION_HEADER),
    )
}

struct Harness {
    fx: Fixture,
    router: Router,
}

async fn harness_with(snapshot_up: bool, origin_up: bool) -> Harness {
    let snapshot_url = if snapshot_up {
        serve(
            Router::new()
                .route("/snapshot", get(stub_snapshot))
                .route("/sitemap.xml", get(stub_sitemap)),
        )
        .await
    } else {
        Url::parse("http://127.0.0.1:9").unwrap()
    };
    let origin_url = if origin_up {
        serve(Router::new().fallback(stub_origin)).await
    } else {
        Url::parse("http://127.0.0.1:9").unwrap()
    };

    let fx = Fixture::shop();
    for host in [BROKEN_HOST, PARTIAL_HOST, REDIRECT_HOST] {
        fx.directory
            .add_domain(fx.store, Hostname::parse(host).unwrap(), true);
    }

    let state = AppState::new(
        test_config(snapshot_url, origin_url),
        Arc::new(fx.directory.clone()),
    )
    .unwrap();
    Harness {
        fx,
        router: app(state),
    }
}

async fn harness() -> Harness {
    harness_with(true, true).await
}

async fn send(router: &Router, method: Method, host: &str, uri: &str, ua: &str, body: &str) -> Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::HOST, host)
                .header(header::USER_AGENT, ua)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_as(router: &Router, host: &str, uri: &str, ua: &str) -> Response {
    send(router, Method::GET, host, uri, ua, "").await
}

async fn body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn route(response: &Response) -> &str {
    response
        .headers()
        .get("x-pagesnap-route")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_crawler_on_custom_domain_gets_snapshot() {
    let h = harness().await;
    let response = get_as(&h.router, "shop.example.com", "/about", GOOGLEBOT).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(route(&response), "snapshot");
    assert_eq!(response.headers()["x-snapshot-source"], "generated");
    assert_eq!(
        body(response).await,
        "snapshot domain=shop.example.com path=/about ua=true"
    );
}

#[tokio::test]
async fn test_host_header_port_and_case_are_ignored() {
    let h = harness().await;
    let response = get_as(&h.router, "Shop.Example.COM:443", "/", GOOGLEBOT).await;
    assert_eq!(route(&response), "snapshot");
}

#[tokio::test]
async fn test_www_twin_of_verified_domain_gets_snapshot() {
    let h = harness().await;
    let response = get_as(&h.router, "www.shop.example.com", "/", GOOGLEBOT).await;
    assert_eq!(route(&response), "snapshot");
    assert!(body(response).await.contains("domain=www.shop.example.com"));
}

#[tokio::test]
async fn test_human_on_custom_domain_goes_to_origin() {
    let h = harness().await;
    let response = get_as(&h.router, "shop.example.com", "/about?ref=ad", CHROME).await;

    assert_eq!(route(&response), "origin");
    let text = body(response).await;
    assert!(text.starts_with("origin GET /about?ref=ad host=shop.example.com proto=http"));
}

#[tokio::test]
async fn test_unverified_domain_crawler_goes_to_origin() {
    let h = harness().await;
    let response = get_as(&h.router, "pending.example.com", "/", GOOGLEBOT).await;
    assert_eq!(route(&response), "origin");
}

#[tokio::test]
async fn test_crawler_on_system_domain_goes_to_origin() {
    let h = harness().await;
    let response = get_as(&h.router, "pagesnap.app", "/site/acme/about", GOOGLEBOT).await;
    assert_eq!(route(&response), "origin");
    assert!(body(response).await.contains("host=pagesnap.app"));
}

#[tokio::test]
async fn test_snapshot_failures_fall_back_to_origin() {
    let h = harness().await;
    for host in [BROKEN_HOST, PARTIAL_HOST, REDIRECT_HOST] {
        let response = get_as(&h.router, host, "/", GOOGLEBOT).await;
        assert_eq!(response.status(), StatusCode::OK, "{host}");
        assert_eq!(route(&response), "origin", "{host}");
        assert!(body(response).await.starts_with("origin GET / "), "{host}");
    }
}

#[tokio::test]
async fn test_snapshot_service_down_falls_back_to_origin() {
    let h = harness_with(false, true).await;
    let response = get_as(&h.router, "shop.example.com", "/", GOOGLEBOT).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(route(&response), "origin");
}

#[tokio::test]
async fn test_domain_verified_later_is_seen_after_ttl() {
    let h = harness().await;
    let late = Hostname::parse("late.example.com").unwrap();
    let id = h.fx.directory.add_domain(h.fx.store, late, false);

    let before = get_as(&h.router, "late.example.com", "/", GOOGLEBOT).await;
    assert_eq!(route(&before), "origin");

    // Cached for the TTL, so still unverified from the edge's point of view.
    h.fx.directory.set_domain_verified(id, true);
    let cached = get_as(&h.router, "late.example.com", "/", GOOGLEBOT).await;
    assert_eq!(route(&cached), "origin");
}

// =============================================================================
// Origin pass-through
// =============================================================================

#[tokio::test]
async fn test_post_is_forwarded_with_body() {
    let h = harness().await;
    let response = send(
        &h.router,
        Method::POST,
        "shop.example.com",
        "/checkout?step=2",
        GOOGLEBOT,
        "email=a%40b.c",
    )
    .await;

    assert_eq!(route(&response), "origin");
    let text = body(response).await;
    assert!(text.starts_with("origin POST /checkout?step=2 host=shop.example.com"));
    assert!(text.ends_with("body=email=a%40b.c"));
}

#[tokio::test]
async fn test_request_id_reaches_origin() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::HOST, "shop.example.com")
                .header("x-request-id", "req-edge-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-edge-1");
    assert!(body(response).await.contains("req=req-edge-1"));
}

#[tokio::test]
async fn test_client_cannot_supply_hydration_or_forwarded_host() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/anything")
                .header(header::HOST, "shop.example.com")
                .header(header::USER_AGENT, CHROME)
                .header(HYDRATION_HEADER, "eyJ0eXBlIjoid2Vic2l0ZV9wYWdlIn0")
                .header("x-forwarded-host", "pagesnap.app")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let text = body(response).await;
    assert!(text.contains(" host=shop.example.com "), "{text}");
    assert!(text.ends_with("hydration=false"), "{text}");
}

#[tokio::test]
async fn test_forwarded_proto_is_preserved() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::HOST, "shop.example.com")
                .header("x-forwarded-proto", "https")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(body(response).await.contains("proto=https"));
}

#[tokio::test]
async fn test_origin_down_is_bad_gateway() {
    let h = harness_with(true, false).await;
    let response = get_as(&h.router, "shop.example.com", "/", CHROME).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// Sitemaps
// =============================================================================

#[tokio::test]
async fn test_custom_domain_sitemap_for_humans_too() {
    let h = harness().await;
    let response = get_as(&h.router, "shop.example.com", "/sitemap.xml", CHROME).await;
    assert_eq!(route(&response), "sitemap");
    assert_eq!(body(response).await, "sitemap domain=shop.example.com");
}

#[tokio::test]
async fn test_system_website_sitemap() {
    let h = harness().await;
    let response = get_as(&h.router, "pagesnap.app", "/site/acme/sitemap.xml", GOOGLEBOT).await;
    assert_eq!(route(&response), "sitemap");
    assert_eq!(body(response).await, "sitemap website=acme");
}

#[tokio::test]
async fn test_unknown_website_sitemap_passes_404_through() {
    let h = harness().await;
    let response = get_as(&h.router, "pagesnap.app", "/site/nope/sitemap.xml", GOOGLEBOT).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(route(&response), "sitemap");
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_is_reserved_on_every_host() {
    let h = harness().await;
    let response = get_as(&h.router, "shop.example.com", "/health", GOOGLEBOT).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "ok");

    let ready = get_as(&h.router, "pagesnap.app", "/health/ready", CHROME).await;
    assert_eq!(ready.status(), StatusCode::OK);
}
