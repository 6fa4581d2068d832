//! Pure URL-scheme matching.
//!
//! This is the first, I/O-free half of content resolution: it decides which
//! scheme a `(host, path)` pair uses. [`Resolver`](crate::Resolver) then
//! looks the named content up. Matching is total: every input yields a
//! [`Route`], never an error.

use crate::hosts::HostKind;
use crate::types::{Hostname, RootId, path_segments};

/// Page slug used when `/site/<websiteSlug>` omits the page.
pub const HOMEPAGE_SLUG: &str = "home";

/// The URL scheme a request matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/site/<websiteSlug>[/<pageSlug>]`
    Site {
        website_slug: String,
        page_slug: Option<String>,
    },
    /// `/funnel/<funnelId>[/<stepSlug>]`
    Funnel {
        funnel_id: RootId,
        step_slug: Option<String>,
    },
    /// `/website/<websiteId>[/<pageSlug>]`: editor preview on system domains.
    WebsitePreview {
        website_id: RootId,
        page_slug: Option<String>,
    },
    /// Any path on a tenant domain. Only the segments are kept; the last one
    /// is the slug.
    Custom {
        host: Hostname,
        segments: Vec<String>,
    },
    /// Nothing matched.
    Unknown,
}

impl Route {
    /// Match `path` on `host`.
    ///
    /// Priority: `/site`, `/funnel`, the `/website` preview (system domains
    /// only), then any custom-domain path, then unknown.
    #[must_use]
    pub fn parse(host: &Hostname, kind: HostKind, path: &str) -> Self {
        let segments: Vec<String> = path_segments(path).map(String::from).collect();

        match segments.as_slice() {
            [scheme, website_slug, rest @ ..] if scheme.eq_ignore_ascii_case("site") => {
                return Self::Site {
                    website_slug: website_slug.to_ascii_lowercase(),
                    page_slug: rest.last().map(|s| s.to_ascii_lowercase()),
                };
            }
            [scheme, id, rest @ ..] if scheme.eq_ignore_ascii_case("funnel") => {
                if let Ok(funnel_id) = RootId::parse(id) {
                    return Self::Funnel {
                        funnel_id,
                        step_slug: rest.last().map(|s| s.to_ascii_lowercase()),
                    };
                }
            }
            [scheme, id, rest @ ..]
                if kind == HostKind::System && scheme.eq_ignore_ascii_case("website") =>
            {
                if let Ok(website_id) = RootId::parse(id) {
                    return Self::WebsitePreview {
                        website_id,
                        page_slug: rest.last().map(|s| s.to_ascii_lowercase()),
                    };
                }
            }
            _ => {}
        }

        match kind {
            HostKind::Custom => Self::Custom {
                host: host.clone(),
                segments: segments.iter().map(|s| s.to_ascii_lowercase()).collect(),
            },
            HostKind::System => Self::Unknown,
        }
    }

    /// Whether this is an editor preview URL.
    #[must_use]
    pub const fn is_preview(&self) -> bool {
        matches!(self, Self::WebsitePreview { .. })
    }
}
