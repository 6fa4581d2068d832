//! Persisted entities read through the [`Directory`](crate::Directory).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentType, RootKind, path_segments};
use super::hostname::Hostname;
use super::id::{ConnectionId, DomainId, LeafId, RootId, StoreId};

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub slug: String,
    pub active: bool,
}

/// A hostname registered by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDomain {
    pub id: DomainId,
    pub store_id: StoreId,
    pub domain: Hostname,
    pub dns_verified: bool,
    pub verification_attempts: i32,
}

impl CustomDomain {
    /// Only verified domains take part in routing.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.dns_verified
    }
}

/// Binds a custom domain to one content root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConnection {
    pub id: ConnectionId,
    pub domain_id: DomainId,
    pub root_kind: RootKind,
    pub root_id: RootId,
    pub is_homepage: bool,
    /// Optional leading path (`/shop`) under which this root is mounted.
    pub path_prefix: Option<String>,
}

impl DomainConnection {
    /// The prefix split into segments; empty when the root is mounted at `/`.
    #[must_use]
    pub fn prefix_segments(&self) -> Vec<String> {
        self.path_prefix
            .as_deref()
            .map(|p| path_segments(p).map(str::to_ascii_lowercase).collect())
            .unwrap_or_default()
    }

    /// If `segments` starts with this connection's prefix, the remainder.
    #[must_use]
    pub fn strip_prefix<'a>(&self, segments: &'a [String]) -> Option<&'a [String]> {
        let prefix = self.prefix_segments();
        if segments.len() < prefix.len() {
            return None;
        }
        let (head, rest) = segments.split_at(prefix.len());
        (head == prefix.as_slice()).then_some(rest)
    }
}

/// Free-form settings attached to a website or funnel.
///
/// Only the keys the snapshot renderer reads are typed; everything else
/// (shipping, tracking, ...) is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootSettings {
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub global_header: Option<serde_json::Value>,
    #[serde(default)]
    pub global_footer: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A website or funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRoot {
    pub id: RootId,
    pub kind: RootKind,
    pub store_id: StoreId,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub published: bool,
    pub settings: RootSettings,
}

impl ContentRoot {
    /// Whether the root may serve public (non-preview) traffic.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.active && self.published
    }
}

/// The routing-relevant part of a page or step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafSummary {
    pub id: LeafId,
    pub root_id: RootId,
    pub content_type: ContentType,
    pub slug: String,
    pub published: bool,
    /// Always `false` for funnel steps.
    pub is_homepage: bool,
    pub position: i32,
    pub updated_at: DateTime<Utc>,
}

/// SEO fields of a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub social_image: Option<String>,
    pub canonical_url: Option<String>,
    pub robots: Option<String>,
}

/// A page or step with everything needed to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentLeaf {
    pub summary: LeafSummary,
    pub name: String,
    pub seo: Seo,
    /// Serialized page-builder document (ordered sections/rows/elements).
    pub document: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connection(prefix: Option<&str>) -> DomainConnection {
        DomainConnection {
            id: ConnectionId::random(),
            domain_id: DomainId::random(),
            root_kind: RootKind::Website,
            root_id: RootId::random(),
            is_homepage: false,
            path_prefix: prefix.map(String::from),
        }
    }

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_strip_prefix_without_prefix_is_identity() {
        let conn = connection(None);
        let path = segs(&["about"]);
        assert_eq!(conn.strip_prefix(&path), Some(path.as_slice()));
    }

    #[test]
    fn test_strip_prefix_matches_case_insensitively_configured_prefix() {
        let conn = connection(Some("/Shop/"));
        let path = segs(&["shop", "checkout"]);
        assert_eq!(conn.strip_prefix(&path).unwrap(), &segs(&["checkout"])[..]);
    }

    #[test]
    fn test_strip_prefix_rejects_other_paths() {
        let conn = connection(Some("/shop"));
        assert!(conn.strip_prefix(&segs(&["blog", "post"])).is_none());
        assert!(conn.strip_prefix(&[]).is_none());
    }

    #[test]
    fn test_settings_keep_unknown_keys() {
        let raw = serde_json::json!({
            "site_name": "Acme",
            "shipping": { "flat_rate": 5 }
        });
        let settings: RootSettings = serde_json::from_value(raw).unwrap();
        assert_eq!(settings.site_name.as_deref(), Some("Acme"));
        assert!(settings.extra.contains_key("shipping"));
    }
}
