//! Integration tests for Pagesnap.
//!
//! [`Stack`] boots the edge, the snapshot service and the origin on
//! ephemeral loopback ports, wired to each other exactly as in production
//! but sharing one in-memory directory and snapshot store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pagesnap-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `conformance` - every tier agrees on classification and resolution
//! - `scenarios` - end-to-end request flows through the edge
//! - `sitemaps` - sitemap URLs resolve back to the content they list

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pagesnap_core::SystemDomains;
use pagesnap_core::memory::{Fixture, InMemorySnapshotStore};
use reqwest::header::{HOST, USER_AGENT};
use secrecy::SecretString;
use tokio::net::TcpListener;
use url::Url;

/// Bearer token the stack's snapshot service accepts.
pub const ADMIN_TOKEN: &str = "kQ8#vR2!xL7@mN4$pW9&tZ3*yB6^cF1h";

pub const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
pub const FACEBOOK: &str = "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)";
pub const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Three running tiers.
pub struct Stack {
    pub fx: Fixture,
    pub store: InMemorySnapshotStore,
    pub edge_url: Url,
    pub snapshot_url: Url,
    pub origin_url: Url,
    pub client: reqwest::Client,
}

async fn bind() -> (TcpListener, SocketAddr, Url) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback port");
    let addr = listener.local_addr().expect("listener address");
    let url = Url::parse(&format!("http://{addr}")).expect("loopback url");
    (listener, addr, url)
}

fn serve(listener: TcpListener, router: axum::Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server error");
    });
}

impl Stack {
    /// Boot the stack over the given fixture.
    pub async fn start(fx: Fixture) -> Self {
        let store = InMemorySnapshotStore::new();
        let (edge_listener, edge_addr, edge_url) = bind().await;
        let (snapshot_listener, snapshot_addr, snapshot_url) = bind().await;
        let (origin_listener, origin_addr, origin_url) = bind().await;
        let database_url = SecretString::from("postgres://unused/in-memory");

        let origin = pagesnap_origin::AppState::new(
            pagesnap_origin::OriginConfig {
                database_url: database_url.clone(),
                host: origin_addr.ip(),
                port: origin_addr.port(),
                snapshot_url: snapshot_url.clone(),
                asset_base: "/static".to_string(),
                asset_dir: None,
                system_domains: SystemDomains::default(),
                sentry_dsn: None,
                sentry_environment: None,
            },
            Arc::new(fx.directory.clone()),
        );
        serve(origin_listener, pagesnap_origin::app(origin));

        let snapshot = pagesnap_snapshot::AppState::new(
            pagesnap_snapshot::SnapshotConfig {
                database_url: database_url.clone(),
                host: snapshot_addr.ip(),
                port: snapshot_addr.port(),
                origin_url: origin_url.clone(),
                platform_url: "https://pagesnap.app".to_string(),
                admin_token: Some(SecretString::from(ADMIN_TOKEN)),
                memory_ttl: Duration::from_secs(300),
                memory_capacity: 1_000,
                origin_timeout: Duration::from_secs(5),
                system_domains: SystemDomains::default(),
                sentry_dsn: None,
                sentry_environment: None,
            },
            Arc::new(fx.directory.clone()),
            Arc::new(store.clone()),
        )
        .expect("snapshot state");
        serve(snapshot_listener, pagesnap_snapshot::app(snapshot));

        let edge = pagesnap_edge::AppState::new(
            pagesnap_edge::EdgeConfig {
                database_url,
                host: edge_addr.ip(),
                port: edge_addr.port(),
                snapshot_url: snapshot_url.clone(),
                origin_url: origin_url.clone(),
                upstream_timeout: Duration::from_secs(5),
                domain_cache_ttl: Duration::from_secs(60),
                system_domains: SystemDomains::default(),
                sentry_dsn: None,
                sentry_environment: None,
            },
            Arc::new(fx.directory.clone()),
        )
        .expect("edge state");
        serve(edge_listener, pagesnap_edge::app(edge));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");

        Self {
            fx,
            store,
            edge_url,
            snapshot_url,
            origin_url,
            client,
        }
    }

    /// Boot the stack over [`Fixture::shop`].
    pub async fn shop() -> Self {
        Self::start(Fixture::shop()).await
    }

    /// Send a GET through the edge as if made to `host`.
    pub async fn visit(&self, host: &str, path: &str, user_agent: &str) -> reqwest::Response {
        let mut url = self.edge_url.clone();
        url.set_path(path);
        self.client
            .get(url)
            .header(HOST, host)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .expect("edge request")
    }

    /// Ask the snapshot service directly.
    pub async fn snapshot(&self, domain: &str, path: &str) -> reqwest::Response {
        let mut url = self.snapshot_url.clone();
        url.set_path("/snapshot");
        url.query_pairs_mut()
            .append_pair("domain", domain)
            .append_pair("path", path);
        self.client
            .get(url)
            .header(USER_AGENT, GOOGLEBOT)
            .send()
            .await
            .expect("snapshot request")
    }

    /// Ask the origin what `(domain, path)` resolves to.
    pub async fn origin_content_ref(&self, domain: &str, path: &str) -> serde_json::Value {
        let mut url = self.origin_url.clone();
        url.set_path("/api/content-ref");
        url.query_pairs_mut()
            .append_pair("domain", domain)
            .append_pair("path", path);
        self.client
            .get(url)
            .send()
            .await
            .expect("origin request")
            .json()
            .await
            .expect("content-ref json")
    }

    /// Post a content event to the snapshot service.
    pub async fn post_event(&self, event: &serde_json::Value) -> serde_json::Value {
        let mut url = self.snapshot_url.clone();
        url.set_path("/admin/events");
        let response = self
            .client
            .post(url)
            .bearer_auth(ADMIN_TOKEN)
            .json(event)
            .send()
            .await
            .expect("event request");
        assert!(response.status().is_success(), "event rejected: {}", response.status());
        response.json().await.expect("event outcome json")
    }
}

/// Header value as a string, or empty.
#[must_use]
pub fn header<'a>(response: &'a reqwest::Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
