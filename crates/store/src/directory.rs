//! `PostgreSQL` [`Directory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use pagesnap_core::{
    ConnectionId, ContentLeaf, ContentRoot, ContentType, CustomDomain, Directory, DirectoryError,
    DomainConnection, DomainId, Hostname, LeafId, LeafSummary, RootId, RootKind, RootSettings,
    Seo, Store, StoreId,
};

use super::RepositoryError;

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    slug: String,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct DomainRow {
    id: DomainId,
    store_id: StoreId,
    domain: String,
    dns_verified: bool,
    verification_attempts: i32,
}

impl TryFrom<DomainRow> for CustomDomain {
    type Error = RepositoryError;

    fn try_from(row: DomainRow) -> Result<Self, Self::Error> {
        let domain = Hostname::parse(&row.domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid domain {:?}: {e}", row.domain))
        })?;
        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            domain,
            dns_verified: row.dns_verified,
            verification_attempts: row.verification_attempts,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: ConnectionId,
    domain_id: DomainId,
    website_id: Option<RootId>,
    funnel_id: Option<RootId>,
    is_homepage: bool,
    path_prefix: Option<String>,
}

impl TryFrom<ConnectionRow> for DomainConnection {
    type Error = RepositoryError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        let (root_kind, root_id) = match (row.website_id, row.funnel_id) {
            (Some(id), None) => (RootKind::Website, id),
            (None, Some(id)) => (RootKind::Funnel, id),
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "connection {} must reference exactly one root",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: row.id,
            domain_id: row.domain_id,
            root_kind,
            root_id,
            is_homepage: row.is_homepage,
            path_prefix: row.path_prefix,
        })
    }
}

/// A domain joined with one of its connections.
#[derive(sqlx::FromRow)]
struct DomainConnectionRow {
    #[sqlx(flatten)]
    domain: DomainRow,
    connection_id: ConnectionId,
    website_id: Option<RootId>,
    funnel_id: Option<RootId>,
    is_homepage: bool,
    path_prefix: Option<String>,
}

#[derive(sqlx::FromRow)]
struct RootRow {
    id: RootId,
    store_id: StoreId,
    slug: String,
    name: String,
    active: bool,
    published: bool,
    settings: serde_json::Value,
}

impl RootRow {
    fn into_root(self, kind: RootKind) -> Result<ContentRoot, RepositoryError> {
        let settings: RootSettings = serde_json::from_value(self.settings).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid settings on {kind} {}: {e}", self.id))
        })?;
        Ok(ContentRoot {
            id: self.id,
            kind,
            store_id: self.store_id,
            slug: self.slug,
            name: self.name,
            active: self.active,
            published: self.published,
            settings,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeafSummaryRow {
    id: LeafId,
    root_id: RootId,
    slug: String,
    published: bool,
    is_homepage: bool,
    position: i32,
    updated_at: DateTime<Utc>,
}

impl LeafSummaryRow {
    fn into_summary(self, content_type: ContentType) -> LeafSummary {
        LeafSummary {
            id: self.id,
            root_id: self.root_id,
            content_type,
            slug: self.slug,
            published: self.published,
            is_homepage: self.is_homepage,
            position: self.position,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LeafRow {
    #[sqlx(flatten)]
    summary: LeafSummaryRow,
    name: String,
    seo_title: Option<String>,
    seo_description: Option<String>,
    social_image: Option<String>,
    canonical_url: Option<String>,
    robots: Option<String>,
    document: serde_json::Value,
}

// =============================================================================
// Per-kind SQL
// =============================================================================

const fn root_select(kind: RootKind) -> &'static str {
    match kind {
        RootKind::Website => {
            "SELECT id, store_id, slug, name, active, published, settings FROM websites"
        }
        RootKind::Funnel => {
            "SELECT id, store_id, slug, name, active, published, settings FROM funnels"
        }
    }
}

const fn leaf_summary_select(kind: RootKind) -> &'static str {
    match kind {
        RootKind::Website => {
            "SELECT id, website_id AS root_id, slug, published, is_homepage, position, updated_at \
             FROM website_pages"
        }
        RootKind::Funnel => {
            "SELECT id, funnel_id AS root_id, slug, published, FALSE AS is_homepage, position, \
             updated_at FROM funnel_steps"
        }
    }
}

const fn leaf_select(kind: RootKind) -> &'static str {
    match kind {
        RootKind::Website => {
            "SELECT id, website_id AS root_id, slug, published, is_homepage, position, updated_at, \
             name, seo_title, seo_description, social_image, canonical_url, robots, document \
             FROM website_pages"
        }
        RootKind::Funnel => {
            "SELECT id, funnel_id AS root_id, slug, published, FALSE AS is_homepage, position, \
             updated_at, name, seo_title, seo_description, social_image, canonical_url, robots, \
             document FROM funnel_steps"
        }
    }
}

const fn root_column(kind: RootKind) -> &'static str {
    match kind {
        RootKind::Website => "website_id",
        RootKind::Funnel => "funnel_id",
    }
}

// =============================================================================
// Directory
// =============================================================================

/// Directory backed by the `PostgreSQL` content tables.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Create a new directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Directory for PgDirectory {
    #[instrument(skip(self))]
    async fn store(&self, id: StoreId) -> Result<Option<Store>, DirectoryError> {
        let row = sqlx::query_as::<_, StoreRow>("SELECT id, slug, active FROM stores WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(|r| Store {
            id: r.id,
            slug: r.slug,
            active: r.active,
        }))
    }

    #[instrument(skip(self), fields(host = %host))]
    async fn verified_domain(
        &self,
        host: &Hostname,
    ) -> Result<Option<CustomDomain>, DirectoryError> {
        let row = sqlx::query_as::<_, DomainRow>(
            r"
            SELECT id, store_id, domain, dns_verified, verification_attempts
            FROM custom_domains
            WHERE domain = $1 AND dns_verified
            ",
        )
        .bind(host.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(CustomDomain::try_from).transpose()?)
    }

    #[instrument(skip(self))]
    async fn connections(
        &self,
        domain: DomainId,
    ) -> Result<Vec<DomainConnection>, DirectoryError> {
        let rows = sqlx::query_as::<_, ConnectionRow>(
            r"
            SELECT id, domain_id, website_id, funnel_id, is_homepage, path_prefix
            FROM domain_connections
            WHERE domain_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(domain)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows
            .into_iter()
            .map(DomainConnection::try_from)
            .collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self))]
    async fn domains_for_root(
        &self,
        kind: RootKind,
        root: RootId,
    ) -> Result<Vec<(CustomDomain, DomainConnection)>, DirectoryError> {
        let sql = format!(
            r"
            SELECT d.id, d.store_id, d.domain, d.dns_verified, d.verification_attempts,
                   c.id AS connection_id, c.website_id, c.funnel_id, c.is_homepage, c.path_prefix
            FROM domain_connections c
            JOIN custom_domains d ON d.id = c.domain_id
            WHERE c.{column} = $1 AND d.dns_verified
            ORDER BY d.domain
            ",
            column = root_column(kind)
        );
        let rows = sqlx::query_as::<_, DomainConnectionRow>(&sql)
            .bind(root)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let connection = DomainConnection::try_from(ConnectionRow {
                id: row.connection_id,
                domain_id: row.domain.id,
                website_id: row.website_id,
                funnel_id: row.funnel_id,
                is_homepage: row.is_homepage,
                path_prefix: row.path_prefix,
            })?;
            pairs.push((CustomDomain::try_from(row.domain)?, connection));
        }
        Ok(pairs)
    }

    #[instrument(skip(self))]
    async fn root(&self, kind: RootKind, id: RootId) -> Result<Option<ContentRoot>, DirectoryError> {
        let sql = format!("{} WHERE id = $1", root_select(kind));
        let row = sqlx::query_as::<_, RootRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(|r| r.into_root(kind)).transpose()?)
    }

    #[instrument(skip(self))]
    async fn website_by_slug(&self, slug: &str) -> Result<Option<ContentRoot>, DirectoryError> {
        let sql = format!("{} WHERE slug = $1", root_select(RootKind::Website));
        let row = sqlx::query_as::<_, RootRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(|r| r.into_root(RootKind::Website)).transpose()?)
    }

    #[instrument(skip(self))]
    async fn roots_for_store(&self, store: StoreId) -> Result<Vec<ContentRoot>, DirectoryError> {
        let mut roots = Vec::new();
        for kind in [RootKind::Website, RootKind::Funnel] {
            let sql = format!("{} WHERE store_id = $1 ORDER BY slug", root_select(kind));
            let rows = sqlx::query_as::<_, RootRow>(&sql)
                .bind(store)
                .fetch_all(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
            for row in rows {
                roots.push(row.into_root(kind)?);
            }
        }
        Ok(roots)
    }

    #[instrument(skip(self))]
    async fn leaves(
        &self,
        kind: RootKind,
        root: RootId,
    ) -> Result<Vec<LeafSummary>, DirectoryError> {
        let sql = format!(
            "{} WHERE {} = $1 ORDER BY position, slug",
            leaf_summary_select(kind),
            root_column(kind)
        );
        let rows = sqlx::query_as::<_, LeafSummaryRow>(&sql)
            .bind(root)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| r.into_summary(kind.leaf_type()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn leaf(
        &self,
        content_type: ContentType,
        id: LeafId,
    ) -> Result<Option<ContentLeaf>, DirectoryError> {
        let Some(kind) = content_type.root_kind() else {
            return Ok(None);
        };
        let sql = format!("{} WHERE id = $1", leaf_select(kind));
        let row = sqlx::query_as::<_, LeafRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(|r| ContentLeaf {
            summary: r.summary.into_summary(content_type),
            name: r.name,
            seo: Seo {
                title: r.seo_title,
                description: r.seo_description,
                social_image: r.social_image,
                canonical_url: r.canonical_url,
                robots: r.robots,
            },
            document: r.document,
        }))
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}
