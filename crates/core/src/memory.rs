//! In-memory [`Directory`] and [`SnapshotStore`].
//!
//! Used by unit tests, router tests and the cross-tier integration tests.
//! Handles are cheap to clone and share their tables, so a test can keep a
//! handle and mutate data while servers read through another.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::directory::{Directory, DirectoryError};
use crate::snapshot_store::{SnapshotStore, SnapshotStoreError};
use crate::types::{
    ConnectionId, ContentLeaf, ContentRoot, ContentType, CustomDomain, DomainConnection, DomainId,
    Hostname, LeafId, LeafSummary, RootId, RootKind, RootSettings, Seo, Snapshot, SnapshotKey,
    Store, StoreId,
};

// =============================================================================
// Directory
// =============================================================================

#[derive(Debug, Default)]
struct Tables {
    stores: HashMap<StoreId, Store>,
    domains: Vec<CustomDomain>,
    connections: Vec<DomainConnection>,
    roots: HashMap<RootId, ContentRoot>,
    leaves: Vec<ContentLeaf>,
}

/// A [`Directory`] backed by shared in-process tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        f(&mut self.tables.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn add_store(&self, slug: &str) -> StoreId {
        let id = StoreId::random();
        self.write(|t| {
            t.stores.insert(
                id,
                Store {
                    id,
                    slug: slug.to_string(),
                    active: true,
                },
            );
        });
        id
    }

    pub fn set_store_active(&self, id: StoreId, active: bool) {
        self.write(|t| {
            if let Some(store) = t.stores.get_mut(&id) {
                store.active = active;
            }
        });
    }

    pub fn add_domain(&self, store: StoreId, domain: Hostname, verified: bool) -> DomainId {
        let id = DomainId::random();
        self.write(|t| {
            t.domains.push(CustomDomain {
                id,
                store_id: store,
                domain,
                dns_verified: verified,
                verification_attempts: i32::from(verified),
            });
        });
        id
    }

    pub fn set_domain_verified(&self, id: DomainId, verified: bool) {
        self.write(|t| {
            if let Some(domain) = t.domains.iter_mut().find(|d| d.id == id) {
                domain.dns_verified = verified;
                domain.verification_attempts += 1;
            }
        });
    }

    pub fn connect(
        &self,
        domain: DomainId,
        root_kind: RootKind,
        root_id: RootId,
        is_homepage: bool,
        path_prefix: Option<&str>,
    ) -> ConnectionId {
        let id = ConnectionId::random();
        self.write(|t| {
            t.connections.push(DomainConnection {
                id,
                domain_id: domain,
                root_kind,
                root_id,
                is_homepage,
                path_prefix: path_prefix.map(String::from),
            });
        });
        id
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        self.write(|t| t.connections.retain(|c| c.id != connection));
    }

    pub fn add_website(&self, store: StoreId, slug: &str, name: &str) -> RootId {
        self.add_root(RootKind::Website, store, slug, name)
    }

    pub fn add_funnel(&self, store: StoreId, slug: &str, name: &str) -> RootId {
        self.add_root(RootKind::Funnel, store, slug, name)
    }

    fn add_root(&self, kind: RootKind, store: StoreId, slug: &str, name: &str) -> RootId {
        let id = RootId::random();
        self.write(|t| {
            t.roots.insert(
                id,
                ContentRoot {
                    id,
                    kind,
                    store_id: store,
                    slug: slug.to_string(),
                    name: name.to_string(),
                    active: true,
                    published: true,
                    settings: RootSettings {
                        site_name: Some(name.to_string()),
                        ..RootSettings::default()
                    },
                },
            );
        });
        id
    }

    pub fn set_root_settings(&self, root: RootId, settings: RootSettings) {
        self.write(|t| {
            if let Some(r) = t.roots.get_mut(&root) {
                r.settings = settings;
            }
        });
    }

    pub fn set_root_published(&self, root: RootId, published: bool) {
        self.write(|t| {
            if let Some(r) = t.roots.get_mut(&root) {
                r.published = published;
            }
        });
    }

    pub fn add_page(
        &self,
        website: RootId,
        slug: &str,
        published: bool,
        is_homepage: bool,
        position: i32,
    ) -> LeafId {
        self.add_leaf(ContentType::WebsitePage, website, slug, published, is_homepage, position)
    }

    pub fn add_step(&self, funnel: RootId, slug: &str, published: bool, position: i32) -> LeafId {
        self.add_leaf(ContentType::FunnelStep, funnel, slug, published, false, position)
    }

    fn add_leaf(
        &self,
        content_type: ContentType,
        root_id: RootId,
        slug: &str,
        published: bool,
        is_homepage: bool,
        position: i32,
    ) -> LeafId {
        let id = LeafId::random();
        let name = title_case(slug);
        self.write(|t| {
            t.leaves.push(ContentLeaf {
                summary: LeafSummary {
                    id,
                    root_id,
                    content_type,
                    slug: slug.to_string(),
                    published,
                    is_homepage,
                    position,
                    updated_at: Utc::now(),
                },
                seo: Seo {
                    title: Some(name.clone()),
                    ..Seo::default()
                },
                document: json!({
                    "sections": [{
                        "rows": [{
                            "elements": [{ "type": "heading", "level": 1, "text": name }]
                        }]
                    }]
                }),
                name,
            });
        });
        id
    }

    fn with_leaf(&self, id: LeafId, f: impl FnOnce(&mut ContentLeaf)) {
        self.write(|t| {
            if let Some(leaf) = t.leaves.iter_mut().find(|l| l.summary.id == id) {
                f(leaf);
                leaf.summary.updated_at = Utc::now();
            }
        });
    }

    pub fn set_leaf_seo(&self, id: LeafId, seo: Seo) {
        self.with_leaf(id, |leaf| leaf.seo = seo);
    }

    pub fn set_leaf_document(&self, id: LeafId, document: serde_json::Value) {
        self.with_leaf(id, |leaf| leaf.document = document);
    }

    pub fn set_leaf_published(&self, id: LeafId, published: bool) {
        self.with_leaf(id, |leaf| leaf.summary.published = published);
    }

    pub fn remove_leaf(&self, id: LeafId) {
        self.write(|t| t.leaves.retain(|l| l.summary.id != id));
    }
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn store(&self, id: StoreId) -> Result<Option<Store>, DirectoryError> {
        Ok(self.read(|t| t.stores.get(&id).cloned()))
    }

    async fn verified_domain(
        &self,
        host: &Hostname,
    ) -> Result<Option<CustomDomain>, DirectoryError> {
        Ok(self.read(|t| {
            t.domains
                .iter()
                .find(|d| &d.domain == host && d.is_usable())
                .cloned()
        }))
    }

    async fn connections(
        &self,
        domain: DomainId,
    ) -> Result<Vec<DomainConnection>, DirectoryError> {
        Ok(self.read(|t| {
            t.connections
                .iter()
                .filter(|c| c.domain_id == domain)
                .cloned()
                .collect()
        }))
    }

    async fn domains_for_root(
        &self,
        kind: RootKind,
        root: RootId,
    ) -> Result<Vec<(CustomDomain, DomainConnection)>, DirectoryError> {
        Ok(self.read(|t| {
            t.connections
                .iter()
                .filter(|c| c.root_kind == kind && c.root_id == root)
                .filter_map(|c| {
                    t.domains
                        .iter()
                        .find(|d| d.id == c.domain_id && d.is_usable())
                        .map(|d| (d.clone(), c.clone()))
                })
                .collect()
        }))
    }

    async fn root(&self, kind: RootKind, id: RootId) -> Result<Option<ContentRoot>, DirectoryError> {
        Ok(self.read(|t| t.roots.get(&id).filter(|r| r.kind == kind).cloned()))
    }

    async fn website_by_slug(&self, slug: &str) -> Result<Option<ContentRoot>, DirectoryError> {
        Ok(self.read(|t| {
            t.roots
                .values()
                .find(|r| r.kind == RootKind::Website && r.slug == slug)
                .cloned()
        }))
    }

    async fn roots_for_store(&self, store: StoreId) -> Result<Vec<ContentRoot>, DirectoryError> {
        let mut roots: Vec<ContentRoot> = self.read(|t| {
            t.roots
                .values()
                .filter(|r| r.store_id == store)
                .cloned()
                .collect()
        });
        roots.sort_by(|a, b| (a.kind, &a.slug).cmp(&(b.kind, &b.slug)));
        Ok(roots)
    }

    async fn leaves(
        &self,
        kind: RootKind,
        root: RootId,
    ) -> Result<Vec<LeafSummary>, DirectoryError> {
        let mut leaves: Vec<LeafSummary> = self.read(|t| {
            t.leaves
                .iter()
                .map(|l| &l.summary)
                .filter(|s| s.root_id == root && s.content_type == kind.leaf_type())
                .cloned()
                .collect()
        });
        leaves.sort_by(|a, b| (a.position, &a.slug).cmp(&(b.position, &b.slug)));
        Ok(leaves)
    }

    async fn leaf(
        &self,
        content_type: ContentType,
        id: LeafId,
    ) -> Result<Option<ContentLeaf>, DirectoryError> {
        Ok(self.read(|t| {
            t.leaves
                .iter()
                .find(|l| l.summary.id == id && l.summary.content_type == content_type)
                .cloned()
        }))
    }
}

// =============================================================================
// Snapshot store
// =============================================================================

/// A [`SnapshotStore`] backed by an in-process map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    rows: Arc<RwLock<BTreeMap<SnapshotKey, Snapshot>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`SnapshotStoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored snapshot, in key order.
    #[must_use]
    pub fn all(&self) -> Vec<Snapshot> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn check(&self) -> Result<(), SnapshotStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SnapshotStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &SnapshotKey) -> Result<Option<Snapshot>, SnapshotStoreError> {
        self.check()?;
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<(), SnapshotStoreError> {
        self.check()?;
        let mut stored = snapshot.clone();
        stored.invalidated_at = None;
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn invalidate(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<u64, SnapshotStoreError> {
        self.check()?;
        let now = Utc::now();
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let mut touched = 0;
        for snapshot in rows.values_mut().filter(|s| {
            s.key.content_type == content_type && s.key.content_id == content_id
        }) {
            snapshot.invalidated_at = Some(now);
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_domain(&self, domain: &Hostname) -> Result<u64, SnapshotStoreError> {
        self.check()?;
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|key, _| key.domain.as_ref() != Some(domain));
        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }

    async fn keys_for(
        &self,
        content_type: ContentType,
        content_id: LeafId,
    ) -> Result<Vec<SnapshotKey>, SnapshotStoreError> {
        self.check()?;
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|k| k.content_type == content_type && k.content_id == content_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), SnapshotStoreError> {
        self.check()
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// A small tenant used across test suites.
///
/// Store `acme` owns website `acme` (pages `home`, `about`, and the draft
/// `draft`) and funnel `launch` (steps `optin`, `thank-you`).
/// `shop.example.com` is verified and connects the website as homepage plus
/// the funnel; `pending.example.com` is unverified and `empty.example.com`
/// is verified with no connections.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub directory: InMemoryDirectory,
    pub store: StoreId,
    pub website: RootId,
    pub funnel: RootId,
    pub domain: DomainId,
    pub website_connection: ConnectionId,
    pub funnel_connection: ConnectionId,
    pub home_page: LeafId,
    pub about_page: LeafId,
    pub draft_page: LeafId,
    pub optin_step: LeafId,
    pub thanks_step: LeafId,
}

impl Fixture {
    /// Hostname of the fixture's connected custom domain.
    pub const SHOP_HOST: &'static str = "shop.example.com";

    #[must_use]
    pub fn shop() -> Self {
        let directory = InMemoryDirectory::new();
        let store = directory.add_store("acme");

        let website = directory.add_website(store, "acme", "Acme");
        let home_page = directory.add_page(website, "home", true, true, 0);
        let about_page = directory.add_page(website, "about", true, false, 1);
        let draft_page = directory.add_page(website, "draft", false, false, 2);

        let funnel = directory.add_funnel(store, "launch", "Launch");
        let optin_step = directory.add_step(funnel, "optin", true, 0);
        let thanks_step = directory.add_step(funnel, "thank-you", true, 1);

        let mut domain = DomainId::random();
        let mut website_connection = ConnectionId::random();
        let mut funnel_connection = ConnectionId::random();
        for (host, verified) in [
            (Self::SHOP_HOST, true),
            ("pending.example.com", false),
            ("empty.example.com", true),
        ] {
            let Ok(hostname) = Hostname::parse(host) else {
                continue;
            };
            let id = directory.add_domain(store, hostname, verified);
            if host == Self::SHOP_HOST {
                domain = id;
                website_connection = directory.connect(id, RootKind::Website, website, true, None);
                funnel_connection = directory.connect(id, RootKind::Funnel, funnel, false, None);
            }
        }

        Self {
            directory,
            store,
            website,
            funnel,
            domain,
            website_connection,
            funnel_connection,
            home_page,
            about_page,
            draft_page,
            optin_step,
            thanks_step,
        }
    }
}
