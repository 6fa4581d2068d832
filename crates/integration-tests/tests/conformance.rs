//! Every tier must agree on who is a crawler and what a request addresses.
//!
//! The classifier and resolver are compiled into each tier from
//! `pagesnap-core`; these tests run one input corpus through the running
//! servers and compare their answers with a direct call.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use pagesnap_core::memory::Fixture;
use pagesnap_core::{ContentRef, Resolver, SystemDomains, classify};
use pagesnap_integration_tests::{CHROME, FACEBOOK, GOOGLEBOT, Stack, header};

// =============================================================================
// Corpus
// =============================================================================

const USER_AGENTS: &[&str] = &[
    GOOGLEBOT,
    FACEBOOK,
    CHROME,
    "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
    "Twitterbot/1.0",
    "LinkedInBot/1.0 (compatible; Mozilla/5.0; Apache-HttpClient +http://www.linkedin.com)",
    "Slackbot-LinkExpanding 1.0 (+https://api.slack.com/robots)",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "curl/8.5.0",
    "",
];

fn requests(fx: &Fixture) -> Vec<(String, String)> {
    let pairs = [
        ("shop.example.com", "/".to_string()),
        ("shop.example.com", "/about".to_string()),
        ("SHOP.example.com:443", "/about/".to_string()),
        ("www.shop.example.com", "//about".to_string()),
        ("shop.example.com", "/draft".to_string()),
        ("shop.example.com", "/optin".to_string()),
        ("shop.example.com", "/missing".to_string()),
        ("pending.example.com", "/".to_string()),
        ("empty.example.com", "/".to_string()),
        ("unknown.example.net", "/about".to_string()),
        ("pagesnap.app", "/site/acme".to_string()),
        ("pagesnap.app", "/site/acme/about".to_string()),
        ("pagesnap.app", "/site/ACME/About".to_string()),
        ("pagesnap.app", "/site/acme/draft".to_string()),
        ("pagesnap.app", format!("/funnel/{}", fx.funnel)),
        ("pagesnap.app", format!("/funnel/{}/thank-you", fx.funnel)),
        ("pagesnap.app", "/funnel/not-a-uuid".to_string()),
        ("pagesnap.app", format!("/website/{}/draft", fx.website)),
        ("pagesnap.app", "/pricing".to_string()),
        ("localhost:3000", "/site/acme".to_string()),
    ];
    pairs
        .into_iter()
        .map(|(host, path)| (host.to_string(), path))
        .collect()
}

fn resolver(fx: &Fixture) -> Resolver {
    Resolver::new(Arc::new(fx.directory.clone()), SystemDomains::default())
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_origin_resolves_like_core() {
    let stack = Stack::shop().await;
    let resolver = resolver(&stack.fx);

    for (host, path) in requests(&stack.fx) {
        let expected = resolver
            .resolve_raw(&host, &path)
            .await
            .unwrap_or_else(|_| ContentRef::unknown(&path));
        let from_origin = stack.origin_content_ref(&host, &path).await;

        assert_eq!(
            from_origin,
            serde_json::to_value(&expected).unwrap(),
            "origin disagrees on {host}{path}"
        );
    }
}

#[tokio::test]
async fn test_snapshot_service_serves_exactly_what_resolves() {
    let stack = Stack::shop().await;
    let resolver = resolver(&stack.fx);

    for (host, path) in requests(&stack.fx) {
        let resolved = resolver.resolve_raw(&host, &path).await.is_ok();
        let response = stack.snapshot(&host, &path).await;
        let failed_open = header(&response, "x-snapshot-source") == "origin-fallback";

        assert_eq!(resolved, !failed_open, "snapshot service disagrees on {host}{path}");
        assert!(
            !response.status().is_server_error(),
            "{host}{path} answered {}",
            response.status()
        );
    }
}

#[tokio::test]
async fn test_repeated_resolution_is_byte_identical() {
    let fx = Fixture::shop();
    let resolver = resolver(&fx);

    for (host, path) in requests(&fx) {
        let first = resolver.resolve_raw(&host, &path).await.ok();
        let second = resolver.resolve_raw(&host, &path).await.ok();
        assert_eq!(
            first.map(|c| c.to_canonical_json().unwrap()),
            second.map(|c| c.to_canonical_json().unwrap()),
        );
    }
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn test_edge_routes_by_core_classifier() {
    let stack = Stack::shop().await;

    for user_agent in USER_AGENTS {
        let response = stack.visit("shop.example.com", "/about", user_agent).await;
        let expected = if classify(user_agent).is_crawler {
            "snapshot"
        } else {
            "origin"
        };
        assert_eq!(
            header(&response, "x-pagesnap-route"),
            expected,
            "edge disagrees on {user_agent:?}"
        );
    }
}

#[tokio::test]
async fn test_edge_never_snapshots_outside_verified_custom_domains() {
    let stack = Stack::shop().await;

    for host in ["pending.example.com", "pagesnap.app", "unknown.example.net"] {
        for user_agent in USER_AGENTS {
            let response = stack.visit(host, "/", user_agent).await;
            assert_eq!(header(&response, "x-pagesnap-route"), "origin", "{host} {user_agent:?}");
        }
    }
}
