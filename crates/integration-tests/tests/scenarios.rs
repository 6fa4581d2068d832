//! End-to-end request flows through the edge.

#![allow(clippy::unwrap_used)]

use pagesnap_core::memory::Fixture;
use pagesnap_core::{ContentType, Hostname, RootKind, Seo};
use pagesnap_integration_tests::{CHROME, FACEBOOK, GOOGLEBOT, Stack, header};
use serde_json::json;

fn canonical(html: &str) -> Option<&str> {
    let start = html.find(r#"<link rel="canonical" href=""#)? + r#"<link rel="canonical" href=""#.len();
    let rest = html.get(start..)?;
    rest.get(..rest.find('"')?)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_a_crawler_gets_homepage_snapshot() {
    let stack = Stack::shop().await;
    stack.fx.directory.set_leaf_seo(
        stack.fx.home_page,
        Seo {
            title: Some("Acme Home".to_string()),
            ..Seo::default()
        },
    );

    let response = stack.visit("shop.example.com", "/", FACEBOOK).await;
    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-pagesnap-route"), "snapshot");
    assert_eq!(header(&response, "x-snapshot-source"), "generated");

    let html = response.text().await.unwrap();
    assert!(html.contains("<title>Acme Home</title>"));
    assert_eq!(canonical(&html), Some("https://shop.example.com/"));

    let again = stack.visit("shop.example.com", "/", FACEBOOK).await;
    assert_eq!(header(&again, "x-snapshot-source"), "memory");
}

#[tokio::test]
async fn test_scenario_b_human_gets_origin_shell() {
    let stack = Stack::shop().await;

    let response = stack.visit("shop.example.com", "/about", CHROME).await;
    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-pagesnap-route"), "origin");
    assert_eq!(header(&response, "x-pagesnap-content"), "resolved");

    let html = response.text().await.unwrap();
    assert!(html.contains(&stack.fx.about_page.to_string()));
    assert!(stack.store.is_empty());
}

#[tokio::test]
async fn test_scenario_c_unverified_domain_goes_to_origin() {
    let fx = Fixture::shop();
    let soon = fx
        .directory
        .add_domain(fx.store, Hostname::parse("soon.example.com").unwrap(), false);
    fx.directory
        .connect(soon, RootKind::Website, fx.website, true, None);
    let stack = Stack::start(fx).await;

    for user_agent in [GOOGLEBOT, CHROME] {
        let response = stack.visit("soon.example.com", "/", user_agent).await;
        assert_eq!(header(&response, "x-pagesnap-route"), "origin");
        assert_eq!(response.status(), 404);
        assert_eq!(header(&response, "x-pagesnap-error"), "unknown_route");
    }
    assert!(stack.store.is_empty());
}

#[tokio::test]
async fn test_scenario_d_regeneration_writes_one_snapshot_per_domain() {
    let fx = Fixture::shop();
    let alt = fx
        .directory
        .add_domain(fx.store, Hostname::parse("alt.example.com").unwrap(), true);
    fx.directory
        .connect(alt, RootKind::Website, fx.website, true, None);
    let stack = Stack::start(fx).await;

    let outcome = stack
        .post_event(&json!({
            "event": "published",
            "content_type": ContentType::WebsitePage,
            "content_id": stack.fx.about_page,
        }))
        .await;
    assert_eq!(outcome["succeeded"].as_array().unwrap().len(), 3);
    assert!(outcome["failed"].as_array().unwrap().is_empty());

    let snapshots: Vec<_> = stack
        .store
        .all()
        .into_iter()
        .filter(|s| s.key.content_id == stack.fx.about_page)
        .collect();
    assert_eq!(snapshots.len(), 3);

    let mut canonicals: Vec<String> = snapshots
        .iter()
        .map(|s| canonical(&s.html).unwrap().to_string())
        .collect();
    canonicals.sort();
    assert_eq!(
        canonicals,
        vec![
            "https://alt.example.com/about",
            "https://pagesnap.app/site/acme/about",
            "https://shop.example.com/about",
        ]
    );
}

#[tokio::test]
async fn test_scenario_e_unconnected_domain_fails_open() {
    let stack = Stack::shop().await;

    let response = stack.snapshot("empty.example.com", "/").await;
    assert_eq!(response.status(), 404);
    assert_eq!(header(&response, "x-snapshot-source"), "origin-fallback");
    assert_eq!(header(&response, "x-pagesnap-error"), "content_not_connected");

    let through_edge = stack.visit("empty.example.com", "/", GOOGLEBOT).await;
    assert!(!through_edge.status().is_server_error());
    assert_eq!(header(&through_edge, "x-pagesnap-route"), "snapshot");
}

// =============================================================================
// Failure handling across tiers
// =============================================================================

#[tokio::test]
async fn test_generation_failure_hydrates_origin() {
    let stack = Stack::shop().await;
    stack
        .fx
        .directory
        .set_leaf_document(stack.fx.about_page, json!({ "sections": 42 }));

    let response = stack.visit("shop.example.com", "/about", GOOGLEBOT).await;
    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-pagesnap-route"), "snapshot");
    assert_eq!(header(&response, "x-snapshot-source"), "origin-fallback");
    assert_eq!(header(&response, "x-pagesnap-content"), "hydrated");
}

#[tokio::test]
async fn test_last_good_snapshot_outlives_a_broken_edit() {
    let stack = Stack::shop().await;
    let first = stack.visit("shop.example.com", "/about", GOOGLEBOT).await;
    assert_eq!(header(&first, "x-snapshot-source"), "generated");

    stack
        .fx
        .directory
        .set_leaf_document(stack.fx.about_page, json!({ "sections": 42 }));
    let outcome = stack
        .post_event(&json!({
            "event": "document_edited",
            "content_type": "website_page",
            "content_id": stack.fx.about_page,
        }))
        .await;
    assert_eq!(outcome["failed"].as_array().unwrap().len(), 2);

    let stale = stack.visit("shop.example.com", "/about", GOOGLEBOT).await;
    assert_eq!(stale.status(), 200);
    assert_eq!(header(&stale, "x-snapshot-source"), "stale");
}

#[tokio::test]
async fn test_domain_disconnect_removes_its_snapshots() {
    let stack = Stack::shop().await;
    let outcome = stack
        .post_event(&json!({ "event": "regenerate_store", "store_id": stack.fx.store }))
        .await;
    assert_eq!(outcome["succeeded"].as_array().unwrap().len(), 8);

    let outcome = stack
        .post_event(&json!({ "event": "domain_disconnected", "domain": "shop.example.com" }))
        .await;
    assert_eq!(outcome["deleted"], 4);
    assert_eq!(stack.store.len(), 4);
}

#[tokio::test]
async fn test_request_id_is_shared_across_tiers() {
    let stack = Stack::shop().await;
    let mut url = stack.edge_url.clone();
    url.set_path("/about");
    let response = stack
        .client
        .get(url)
        .header("host", "shop.example.com")
        .header("user-agent", CHROME)
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(header(&response, "x-request-id"), "trace-me-123");
}

#[tokio::test]
async fn test_preview_redirects_humans_to_snapshot_service() {
    let stack = Stack::shop().await;
    let path = format!("/website/{}/draft", stack.fx.website);

    let response = stack.visit("pagesnap.app", &path, CHROME).await;
    assert_eq!(response.status(), 307);
    let location = header(&response, "location");
    assert!(location.starts_with(stack.snapshot_url.as_str().trim_end_matches('/')));

    let preview = stack.client.get(location).send().await.unwrap();
    assert_eq!(preview.status(), 200);
    assert_eq!(header(&preview, "cache-control"), "no-store");
    assert!(preview.text().await.unwrap().contains("noindex, nofollow"));
}
