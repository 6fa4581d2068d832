//! Pre-rendered HTML snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentRef, ContentType};
use super::hostname::Hostname;
use super::id::LeafId;

/// Cache key of a snapshot: one per leaf per reachable domain.
///
/// `domain: None` is the domain-less default served on system domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub content_type: ContentType,
    pub content_id: LeafId,
    pub domain: Option<Hostname>,
}

impl SnapshotKey {
    #[must_use]
    pub const fn new(content_type: ContentType, content_id: LeafId, domain: Option<Hostname>) -> Self {
        Self {
            content_type,
            content_id,
            domain,
        }
    }

    /// The key a resolved reference is cached under, if it has one.
    #[must_use]
    pub fn for_ref(content: &ContentRef) -> Option<Self> {
        if !content.is_resolved() {
            return None;
        }
        content
            .leaf_id
            .map(|id| Self::new(content.content_type, id, content.domain.clone()))
    }

    /// The domain column value; the default snapshot is stored as `""`.
    #[must_use]
    pub fn domain_column(&self) -> &str {
        self.domain.as_ref().map_or("", Hostname::as_str)
    }
}

impl core::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.content_type,
            self.content_id,
            self.domain.as_ref().map_or("default", Hostname::as_str)
        )
    }
}

/// A generated HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub key: SnapshotKey,
    pub html: String,
    pub generated_at: DateTime<Utc>,
    /// Set when the content changed after generation. Invalidated snapshots
    /// are not served as fresh, but remain available as the last good copy.
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    #[must_use]
    pub fn new(key: SnapshotKey, html: String) -> Self {
        Self {
            key,
            html,
            generated_at: Utc::now(),
            invalidated_at: None,
        }
    }

    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.invalidated_at.is_none()
    }
}
