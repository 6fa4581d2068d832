//! Content identity: what a `(hostname, path)` pair points at.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::hostname::Hostname;
use super::id::{LeafId, RootId, StoreId};

/// The kind of content leaf a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    WebsitePage,
    FunnelStep,
    Unknown,
}

impl ContentType {
    /// Stable string form, used for cache keys and the `snapshot_cache` table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebsitePage => "website_page",
            Self::FunnelStep => "funnel_step",
            Self::Unknown => "unknown",
        }
    }

    /// The root kind that owns leaves of this type.
    #[must_use]
    pub const fn root_kind(self) -> Option<RootKind> {
        match self {
            Self::WebsitePage => Some(RootKind::Website),
            Self::FunnelStep => Some(RootKind::Funnel),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website_page" => Ok(Self::WebsitePage),
            "funnel_step" => Ok(Self::FunnelStep),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("invalid content type: {s}")),
        }
    }
}

/// A content root: the container that owns an ordered set of leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    Website,
    Funnel,
}

impl RootKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Funnel => "funnel",
        }
    }

    /// The leaf type a root of this kind owns.
    #[must_use]
    pub const fn leaf_type(self) -> ContentType {
        match self {
            Self::Website => ContentType::WebsitePage,
            Self::Funnel => ContentType::FunnelStep,
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RootKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(Self::Website),
            "funnel" => Ok(Self::Funnel),
            _ => Err(format!("invalid root kind: {s}")),
        }
    }
}

/// The resolved identity of a request.
///
/// Produced by the resolver and consumed independently by the Snapshot
/// Service and the Origin Application. Both tiers must produce the same
/// value for the same input, so the serialized form is part of the contract:
/// field order is fixed and `slug_path` is derived from the resolved content
/// rather than echoed from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub store_id: Option<StoreId>,
    pub root_id: Option<RootId>,
    pub leaf_id: Option<LeafId>,
    /// `<root slug>/<leaf slug>` for resolved content, or the normalised
    /// request path for unknown routes.
    pub slug_path: String,
    /// The custom domain the content was reached through; `None` on system
    /// domains.
    pub domain: Option<Hostname>,
    pub is_homepage: bool,
    /// Reached through a preview URL (drafts allowed, never indexed).
    pub preview: bool,
}

impl ContentRef {
    /// An unresolved reference for `path`.
    #[must_use]
    pub fn unknown(path: &str) -> Self {
        Self {
            content_type: ContentType::Unknown,
            store_id: None,
            root_id: None,
            leaf_id: None,
            slug_path: normalize_path(path),
            domain: None,
            is_homepage: false,
            preview: false,
        }
    }

    /// Whether this reference points at actual content.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self.content_type, ContentType::Unknown) && self.leaf_id.is_some()
    }

    /// The canonical JSON encoding shared by every tier.
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails, which cannot happen for
    /// this type's fields.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Collapse duplicate and trailing slashes: `//about//` becomes `/about`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let joined = path_segments(path).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

/// Non-empty path segments, ignoring any query string or fragment.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path.get(..end)
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
}
