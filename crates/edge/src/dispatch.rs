//! The routing decision, separated from the I/O that carries it out.
//!
//! Crawlers on verified custom domains get snapshots; sitemap paths go to
//! the snapshot service's sitemap endpoint; everything else goes to the
//! origin unchanged.

use axum::http::Method;
use pagesnap_core::{ClientClass, HostKind, Hostname};

/// Facts about a request the decision depends on.
#[derive(Debug, Clone)]
pub struct RequestFacts<'a> {
    pub method: &'a Method,
    pub host: &'a Hostname,
    pub host_kind: HostKind,
    /// Whether the host is a DNS-verified custom domain.
    pub verified: bool,
    pub path: &'a str,
    pub client: ClientClass,
}

/// Which sitemap the snapshot service should build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapTarget {
    Domain(Hostname),
    Website(String),
}

impl SitemapTarget {
    /// The query parameter selecting this sitemap.
    #[must_use]
    pub fn query(&self) -> (&'static str, &str) {
        match self {
            Self::Domain(host) => ("domain", host.as_str()),
            Self::Website(slug) => ("website", slug),
        }
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Pre-rendered HTML from the snapshot service.
    Snapshot,
    /// A sitemap from the snapshot service.
    Sitemap(SitemapTarget),
    /// The origin application, unchanged.
    Origin,
}

impl Decision {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Sitemap(_) => "sitemap",
            Self::Origin => "origin",
        }
    }
}

const SITEMAP_FILE: &str = "sitemap.xml";

/// Decide where a request goes.
#[must_use]
pub fn decide(facts: &RequestFacts<'_>) -> Decision {
    let readable = facts.method == Method::GET || facts.method == Method::HEAD;
    if !readable {
        return Decision::Origin;
    }

    let custom = facts.host_kind == HostKind::Custom && facts.verified;
    if let Some(target) = sitemap_target(facts, custom) {
        return Decision::Sitemap(target);
    }

    if custom && facts.client.is_crawler {
        Decision::Snapshot
    } else {
        Decision::Origin
    }
}

fn sitemap_target(facts: &RequestFacts<'_>, custom: bool) -> Option<SitemapTarget> {
    let segments: Vec<&str> = facts.path.split('/').filter(|s| !s.is_empty()).collect();
    match (facts.host_kind, segments.as_slice()) {
        (HostKind::Custom, [file]) if custom && file.eq_ignore_ascii_case(SITEMAP_FILE) => {
            Some(SitemapTarget::Domain(facts.host.clone()))
        }
        (HostKind::System, [scheme, slug, file])
            if scheme.eq_ignore_ascii_case("site") && file.eq_ignore_ascii_case(SITEMAP_FILE) =>
        {
            Some(SitemapTarget::Website(slug.to_ascii_lowercase()))
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pagesnap_core::classify;

    use super::*;

    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    fn decide_for(method: &Method, host: &str, kind: HostKind, verified: bool, path: &str, ua: &str) -> Decision {
        let host = Hostname::parse(host).unwrap();
        decide(&RequestFacts {
            method,
            host: &host,
            host_kind: kind,
            verified,
            path,
            client: classify(ua),
        })
    }

    #[test]
    fn test_crawler_on_verified_custom_domain_gets_snapshot() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, true, "/", GOOGLEBOT);
        assert_eq!(decision, Decision::Snapshot);
    }

    #[test]
    fn test_human_on_custom_domain_goes_to_origin() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, true, "/about", CHROME);
        assert_eq!(decision, Decision::Origin);
    }

    #[test]
    fn test_unverified_domain_goes_to_origin_for_crawlers() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, false, "/", GOOGLEBOT);
        assert_eq!(decision, Decision::Origin);
    }

    #[test]
    fn test_crawler_on_system_domain_goes_to_origin() {
        let decision = decide_for(&Method::GET, "pagesnap.app", HostKind::System, false, "/site/acme", GOOGLEBOT);
        assert_eq!(decision, Decision::Origin);
    }

    #[test]
    fn test_writes_always_go_to_origin() {
        let decision = decide_for(&Method::POST, "shop.example.com", HostKind::Custom, true, "/", GOOGLEBOT);
        assert_eq!(decision, Decision::Origin);
    }

    #[test]
    fn test_custom_domain_sitemap_for_any_client() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, true, "/sitemap.xml", CHROME);
        assert_eq!(
            decision,
            Decision::Sitemap(SitemapTarget::Domain(Hostname::parse("shop.example.com").unwrap()))
        );
    }

    #[test]
    fn test_unverified_domain_sitemap_goes_to_origin() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, false, "/sitemap.xml", GOOGLEBOT);
        assert_eq!(decision, Decision::Origin);
    }

    #[test]
    fn test_system_website_sitemap() {
        let decision = decide_for(&Method::GET, "pagesnap.app", HostKind::System, false, "/site/Acme/sitemap.xml", CHROME);
        assert_eq!(decision, Decision::Sitemap(SitemapTarget::Website("acme".to_string())));
        assert_eq!(decision.as_str(), "sitemap");
    }

    #[test]
    fn test_nested_sitemap_path_is_not_a_sitemap() {
        let decision = decide_for(&Method::GET, "shop.example.com", HostKind::Custom, true, "/blog/sitemap.xml", CHROME);
        assert_eq!(decision, Decision::Origin);
    }
}
