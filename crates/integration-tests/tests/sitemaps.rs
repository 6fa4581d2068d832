//! Sitemap URLs must resolve back to the content they list.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use pagesnap_core::{Resolver, SystemDomains};
use pagesnap_integration_tests::{CHROME, GOOGLEBOT, Stack, header};
use url::Url;

fn locs(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|rest| rest.split_once("</loc>").map(|(loc, _)| loc.to_string()))
        .collect()
}

async fn assert_every_loc_resolves(stack: &Stack, locs: &[String]) {
    let resolver = Resolver::new(Arc::new(stack.fx.directory.clone()), SystemDomains::default());
    for loc in locs {
        let url = Url::parse(loc).unwrap();
        let host = url.host_str().unwrap();
        let content = resolver
            .resolve_raw(host, url.path())
            .await
            .unwrap_or_else(|e| panic!("{loc} does not resolve: {e}"));
        assert!(!content.preview, "{loc} is a preview URL");

        let from_origin = stack.origin_content_ref(host, url.path()).await;
        assert_eq!(from_origin, serde_json::to_value(&content).unwrap(), "{loc}");
    }
}

#[tokio::test]
async fn test_custom_domain_sitemap_round_trips() {
    let stack = Stack::shop().await;

    let response = stack.visit("shop.example.com", "/sitemap.xml", CHROME).await;
    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "x-pagesnap-route"), "sitemap");
    assert!(header(&response, "content-type").starts_with("application/xml"));

    let locs = locs(&response.text().await.unwrap());
    assert!(locs.contains(&"https://shop.example.com/".to_string()));
    assert!(locs.iter().all(|l| !l.contains("draft")));
    assert_eq!(locs.iter().collect::<HashSet<_>>().len(), locs.len());
    assert_every_loc_resolves(&stack, &locs).await;
}

#[tokio::test]
async fn test_system_website_sitemap_round_trips() {
    let stack = Stack::shop().await;

    let response = stack
        .visit("pagesnap.app", "/site/acme/sitemap.xml", GOOGLEBOT)
        .await;
    assert_eq!(response.status(), 200);

    let locs = locs(&response.text().await.unwrap());
    assert!(!locs.is_empty());
    assert!(locs.iter().all(|l| l.starts_with("https://pagesnap.app/site/acme")));
    assert_every_loc_resolves(&stack, &locs).await;
}

#[tokio::test]
async fn test_unverified_domain_has_no_sitemap_route() {
    let stack = Stack::shop().await;
    let response = stack.visit("pending.example.com", "/sitemap.xml", CHROME).await;
    assert_eq!(header(&response, "x-pagesnap-route"), "origin");
}
