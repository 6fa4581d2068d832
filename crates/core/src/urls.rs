//! Public paths of content, the inverse of the resolver.
//!
//! Canonical URLs and sitemap entries are built here. Each path produced is
//! one the [`Resolver`](crate::Resolver) maps back onto the same leaf; the
//! sitemap double-checks this before emitting an entry.

use crate::types::{ContentRoot, DomainConnection, LeafSummary, RootKind};

/// Path of a leaf on a system domain.
///
/// Website homepages get the short `/site/<slug>` form; funnels always
/// spell out the step.
#[must_use]
pub fn system_path(root: &ContentRoot, leaf: &LeafSummary, is_homepage: bool) -> String {
    match root.kind {
        RootKind::Website if is_homepage => format!("/site/{}", root.slug),
        RootKind::Website => format!("/site/{}/{}", root.slug, leaf.slug),
        RootKind::Funnel => format!("/funnel/{}/{}", root.id, leaf.slug),
    }
}

/// Path of a leaf on a custom domain reached through `connection`.
#[must_use]
pub fn custom_path(connection: &DomainConnection, leaf: &LeafSummary, is_homepage: bool) -> String {
    let mut segments = connection.prefix_segments();
    let mounted_at_root = segments.is_empty();

    if is_homepage && (connection.is_homepage || !mounted_at_root) {
        return format!("/{}", segments.join("/"));
    }
    segments.push(leaf.slug.to_ascii_lowercase());
    format!("/{}", segments.join("/"))
}

/// Join a base such as `https://shop.example.com` with an absolute path.
#[must_use]
pub fn absolute(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// The public base URL of a custom domain.
#[must_use]
pub fn domain_base(domain: &str) -> String {
    format!("https://{domain}")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{ConnectionId, ContentType, DomainId, LeafId, RootId, RootSettings, StoreId};

    fn root(kind: RootKind) -> ContentRoot {
        ContentRoot {
            id: RootId::random(),
            kind,
            store_id: StoreId::random(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            active: true,
            published: true,
            settings: RootSettings::default(),
        }
    }

    fn leaf(slug: &str) -> LeafSummary {
        LeafSummary {
            id: LeafId::random(),
            root_id: RootId::random(),
            content_type: ContentType::WebsitePage,
            slug: slug.to_string(),
            published: true,
            is_homepage: false,
            position: 0,
            updated_at: Utc::now(),
        }
    }

    fn connection(is_homepage: bool, prefix: Option<&str>) -> DomainConnection {
        DomainConnection {
            id: ConnectionId::random(),
            domain_id: DomainId::random(),
            root_kind: RootKind::Website,
            root_id: RootId::random(),
            is_homepage,
            path_prefix: prefix.map(String::from),
        }
    }

    #[test]
    fn test_system_paths() {
        let site = root(RootKind::Website);
        assert_eq!(system_path(&site, &leaf("home"), true), "/site/acme");
        assert_eq!(system_path(&site, &leaf("about"), false), "/site/acme/about");

        let funnel = root(RootKind::Funnel);
        assert_eq!(
            system_path(&funnel, &leaf("optin"), true),
            format!("/funnel/{}/optin", funnel.id)
        );
    }

    #[test]
    fn test_custom_paths() {
        assert_eq!(custom_path(&connection(true, None), &leaf("home"), true), "/");
        assert_eq!(
            custom_path(&connection(true, None), &leaf("about"), false),
            "/about"
        );
        assert_eq!(
            custom_path(&connection(false, None), &leaf("home"), true),
            "/home"
        );
        assert_eq!(
            custom_path(&connection(false, Some("/Shop")), &leaf("home"), true),
            "/shop"
        );
        assert_eq!(
            custom_path(&connection(false, Some("/shop")), &leaf("cart"), false),
            "/shop/cart"
        );
    }

    #[test]
    fn test_absolute_trims_base_slash() {
        assert_eq!(absolute("https://a.test/", "/x"), "https://a.test/x");
        assert_eq!(domain_base("a.test"), "https://a.test");
    }
}
