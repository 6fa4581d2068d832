//! Snapshot generation pipeline.
//!
//! Turns a content leaf (SEO fields plus page-builder document) into a
//! standalone HTML document for one [`SnapshotKey`]. The output is a pure
//! function of the stored content and the key's domain; no timestamps are
//! rendered, so regenerating unchanged content yields identical bytes.

use std::sync::Arc;

use askama::Template;
use pagesnap_core::resolver::homepage_of;
use pagesnap_core::urls;
use pagesnap_core::{
    ContentLeaf, ContentRoot, ContentType, Directory, DirectoryError, DomainConnection, ErrorKind,
    Hostname, LeafId, LeafSummary, Snapshot, SnapshotKey,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::document::{PageDocument, SectionView};

/// Errors producing a snapshot.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The leaf, its root or its store is missing or not public.
    #[error("content not found: {0}")]
    NotFound(String),

    /// The key names a domain the content is not connected to.
    #[error("content is not connected to {0}")]
    NotConnected(Hostname),

    /// The stored page-builder document could not be read.
    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),

    /// Template rendering failed.
    #[error("render failed: {0}")]
    Render(#[from] askama::Error),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl GenerationError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::ContentNotFound,
            Self::NotConnected(_) => ErrorKind::ContentNotConnected,
            Self::Document(_) | Self::Render(_) => ErrorKind::GenerationFailure,
            Self::Directory(_) => ErrorKind::Unavailable,
        }
    }
}

// =============================================================================
// Template
// =============================================================================

#[derive(Template)]
#[template(path = "snapshot.html")]
struct SnapshotTemplate {
    lang: String,
    title: String,
    description: Option<String>,
    robots: String,
    canonical: String,
    favicon: Option<String>,
    site_name: String,
    image: Option<String>,
    breadcrumbs_json: String,
    header: Vec<SectionView>,
    sections: Vec<SectionView>,
    footer: Vec<SectionView>,
}

const ROBOTS_DEFAULT: &str = "index, follow";
const ROBOTS_PREVIEW: &str = "noindex, nofollow";

// =============================================================================
// Generator
// =============================================================================

/// Where a key's URLs live.
enum Base {
    /// The system domain under `platform_url`.
    System,
    /// A custom domain reached through one connection.
    Custom(Hostname, DomainConnection),
}

/// Renders snapshots from directory content.
#[derive(Clone)]
pub struct Generator {
    directory: Arc<dyn Directory>,
    platform_url: String,
}

impl Generator {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, platform_url: impl Into<String>) -> Self {
        Self {
            directory,
            platform_url: platform_url.into(),
        }
    }

    /// Render the snapshot for `key`.
    ///
    /// Previews may render unpublished content and are marked `noindex`.
    ///
    /// # Errors
    ///
    /// See [`GenerationError`].
    #[instrument(skip(self), fields(key = %key))]
    pub async fn generate(
        &self,
        key: &SnapshotKey,
        preview: bool,
    ) -> Result<Snapshot, GenerationError> {
        let (leaf, root) = self.load(key.content_type, key.content_id, preview).await?;
        let leaves = self.directory.leaves(root.kind, root.id).await?;
        let homepage = homepage_of(root.kind, &leaves).cloned();
        let is_homepage = homepage.as_ref().is_some_and(|h| h.id == leaf.summary.id);

        let base = self.base_for(key, &root).await?;
        let here = self.locate(&base, &root, &leaf.summary, is_homepage);
        let canonical = leaf
            .seo
            .canonical_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| here.clone());

        let site_name = root
            .settings
            .site_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| root.name.clone());
        let title = leaf
            .seo
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| leaf.name.clone());

        let home_url = homepage
            .as_ref()
            .map_or_else(|| here.clone(), |h| self.locate(&base, &root, h, true));
        let breadcrumbs_json = breadcrumbs(&site_name, &home_url, (!is_homepage).then_some((&title, &here)));

        let robots = if preview {
            ROBOTS_PREVIEW.to_string()
        } else {
            leaf.seo
                .robots
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| ROBOTS_DEFAULT.to_string())
        };

        let template = SnapshotTemplate {
            lang: root
                .settings
                .extra
                .get("language")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("en")
                .to_string(),
            title,
            description: non_blank(leaf.seo.description.as_ref()),
            robots,
            canonical,
            favicon: non_blank(root.settings.favicon_url.as_ref()),
            site_name,
            image: non_blank(leaf.seo.social_image.as_ref()),
            breadcrumbs_json,
            header: chrome(root.settings.global_header.as_ref())?,
            sections: PageDocument::from_value(&leaf.document)?.to_view(),
            footer: chrome(root.settings.global_footer.as_ref())?,
        };

        let html = template.render()?;
        debug!(bytes = html.len(), "Snapshot rendered");
        Ok(Snapshot::new(key.clone(), html))
    }

    /// Every key a public leaf is reachable under: the domain-less default
    /// plus each verified custom domain connected to its root.
    ///
    /// # Errors
    ///
    /// [`GenerationError::NotFound`] when the leaf is not public.
    #[instrument(skip(self))]
    pub async fn targets(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<Vec<SnapshotKey>, GenerationError> {
        let (_, root) = self.load(content_type, content_id, false).await?;
        let mut keys = vec![SnapshotKey::new(content_type, content_id, None)];
        for (domain, _) in self.directory.domains_for_root(root.kind, root.id).await? {
            let key = SnapshotKey::new(content_type, content_id, Some(domain.domain));
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn load(
        &self,
        content_type: ContentType,
        id: LeafId,
        preview: bool,
    ) -> Result<(ContentLeaf, ContentRoot), GenerationError> {
        let not_found = || GenerationError::NotFound(format!("{content_type}:{id}"));
        let kind = content_type.root_kind().ok_or_else(not_found)?;

        let leaf = self
            .directory
            .leaf(content_type, id)
            .await?
            .filter(|l| preview || l.summary.published)
            .ok_or_else(not_found)?;
        let root = self
            .directory
            .root(kind, leaf.summary.root_id)
            .await?
            .filter(|r| preview || r.is_public())
            .ok_or_else(not_found)?;

        if !preview {
            let active = self
                .directory
                .store(root.store_id)
                .await?
                .is_some_and(|s| s.active);
            if !active {
                return Err(not_found());
            }
        }
        Ok((leaf, root))
    }

    async fn base_for(&self, key: &SnapshotKey, root: &ContentRoot) -> Result<Base, GenerationError> {
        let Some(host) = &key.domain else {
            return Ok(Base::System);
        };
        self.directory
            .domains_for_root(root.kind, root.id)
            .await?
            .into_iter()
            .find(|(domain, _)| &domain.domain == host)
            .map(|(domain, connection)| Base::Custom(domain.domain, connection))
            .ok_or_else(|| GenerationError::NotConnected(host.clone()))
    }

    fn locate(&self, base: &Base, root: &ContentRoot, leaf: &LeafSummary, is_homepage: bool) -> String {
        match base {
            Base::System => urls::absolute(
                &self.platform_url,
                &urls::system_path(root, leaf, is_homepage),
            ),
            Base::Custom(host, connection) => urls::absolute(
                &urls::domain_base(host.as_str()),
                &urls::custom_path(connection, leaf, is_homepage),
            ),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn non_blank(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// Global header or footer sections from root settings.
fn chrome(value: Option<&serde_json::Value>) -> Result<Vec<SectionView>, serde_json::Error> {
    value.map_or_else(
        || Ok(Vec::new()),
        |v| PageDocument::from_value(v).map(|doc| doc.to_view()),
    )
}

/// schema.org `BreadcrumbList`, safe to embed in a `<script>` element.
fn breadcrumbs(site_name: &str, home_url: &str, current: Option<(&String, &String)>) -> String {
    let mut items = vec![json!({
        "@type": "ListItem",
        "position": 1,
        "name": site_name,
        "item": home_url,
    })];
    if let Some((name, url)) = current {
        items.push(json!({
            "@type": "ListItem",
            "position": 2,
            "name": name,
            "item": url,
        }));
    }
    let list = json!({
        "@context": "https://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": items,
    });
    list.to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pagesnap_core::memory::Fixture;
    use pagesnap_core::Seo;
    use serde_json::json;

    use super::*;

    fn generator(fx: &Fixture) -> Generator {
        Generator::new(Arc::new(fx.directory.clone()), "https://pagesnap.app")
    }

    fn shop() -> Option<Hostname> {
        Some(Hostname::parse(Fixture::SHOP_HOST).unwrap())
    }

    #[tokio::test]
    async fn test_homepage_on_custom_domain_has_root_canonical() {
        let fx = Fixture::shop();
        fx.directory.set_leaf_seo(
            fx.home_page,
            Seo {
                title: Some("Acme Home".to_string()),
                description: Some("Fresh goods".to_string()),
                ..Seo::default()
            },
        );

        let key = SnapshotKey::new(ContentType::WebsitePage, fx.home_page, shop());
        let snapshot = generator(&fx).generate(&key, false).await.unwrap();

        assert!(snapshot.html.contains("<title>Acme Home</title>"));
        assert!(snapshot.html.contains(r#"<link rel="canonical" href="https://shop.example.com/">"#));
        assert!(snapshot.html.contains(r#"<meta name="description" content="Fresh goods">"#));
        assert!(snapshot.html.contains(r#"<meta name="robots" content="index, follow">"#));
    }

    #[tokio::test]
    async fn test_default_key_uses_platform_url() {
        let fx = Fixture::shop();
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None);
        let snapshot = generator(&fx).generate(&key, false).await.unwrap();

        assert!(snapshot.html.contains(r#"href="https://pagesnap.app/site/acme/about""#));
        assert!(snapshot.html.contains("BreadcrumbList"));
    }

    #[tokio::test]
    async fn test_each_domain_gets_its_own_canonical() {
        let fx = Fixture::shop();
        let generator = generator(&fx);
        let default = generator
            .generate(&SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None), false)
            .await
            .unwrap();
        let custom = generator
            .generate(&SnapshotKey::new(ContentType::WebsitePage, fx.about_page, shop()), false)
            .await
            .unwrap();

        assert_ne!(default.html, custom.html);
        assert!(custom.html.contains(r#"<link rel="canonical" href="https://shop.example.com/about">"#));
    }

    #[tokio::test]
    async fn test_regeneration_is_byte_identical() {
        let fx = Fixture::shop();
        let key = SnapshotKey::new(ContentType::FunnelStep, fx.optin_step, shop());
        let generator = generator(&fx);
        let first = generator.generate(&key, false).await.unwrap();
        let second = generator.generate(&key, false).await.unwrap();
        assert_eq!(first.html, second.html);
    }

    #[tokio::test]
    async fn test_seo_canonical_override_wins() {
        let fx = Fixture::shop();
        fx.directory.set_leaf_seo(
            fx.about_page,
            Seo {
                canonical_url: Some("https://acme.example.org/about-us".to_string()),
                social_image: Some("https://cdn.example.com/a.png".to_string()),
                ..Seo::default()
            },
        );
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.about_page, shop());
        let html = generator(&fx).generate(&key, false).await.unwrap().html;

        assert!(html.contains(r#"href="https://acme.example.org/about-us""#));
        assert!(html.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
    }

    #[tokio::test]
    async fn test_unpublished_leaf_only_renders_as_preview() {
        let fx = Fixture::shop();
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.draft_page, None);
        let generator = generator(&fx);

        let err = generator.generate(&key, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentNotFound);

        let preview = generator.generate(&key, true).await.unwrap();
        assert!(preview.html.contains(r#"<meta name="robots" content="noindex, nofollow">"#));
    }

    #[tokio::test]
    async fn test_unconnected_domain_is_rejected() {
        let fx = Fixture::shop();
        let key = SnapshotKey::new(
            ContentType::WebsitePage,
            fx.about_page,
            Some(Hostname::parse("elsewhere.example.com").unwrap()),
        );
        let err = generator(&fx).generate(&key, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentNotConnected);
    }

    #[tokio::test]
    async fn test_empty_document_renders_placeholder() {
        let fx = Fixture::shop();
        fx.directory
            .set_leaf_document(fx.about_page, json!({ "sections": [] }));
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None);
        let html = generator(&fx).generate(&key, false).await.unwrap().html;
        assert!(html.contains("still being set up"));
    }

    #[tokio::test]
    async fn test_malformed_document_is_generation_failure() {
        let fx = Fixture::shop();
        fx.directory
            .set_leaf_document(fx.about_page, json!({ "sections": "oops" }));
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None);
        let err = generator(&fx).generate(&key, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    }

    #[tokio::test]
    async fn test_markup_in_content_is_escaped() {
        let fx = Fixture::shop();
        fx.directory.set_leaf_seo(
            fx.about_page,
            Seo {
                title: Some("</script><script>alert(1)</script>".to_string()),
                ..Seo::default()
            },
        );
        let key = SnapshotKey::new(ContentType::WebsitePage, fx.about_page, None);
        let html = generator(&fx).generate(&key, false).await.unwrap().html;
        assert!(!html.contains("<script>alert(1)"));
    }

    #[tokio::test]
    async fn test_targets_cover_default_and_connected_domains() {
        let fx = Fixture::shop();
        let keys = generator(&fx)
            .targets(ContentType::WebsitePage, fx.about_page)
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].domain, None);
        assert_eq!(keys[1].domain, shop());
    }

    #[tokio::test]
    async fn test_targets_reject_unpublished_root() {
        let fx = Fixture::shop();
        fx.directory.set_root_published(fx.funnel, false);
        let err = generator(&fx)
            .targets(ContentType::FunnelStep, fx.optin_step)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotFound(_)));
    }
}
