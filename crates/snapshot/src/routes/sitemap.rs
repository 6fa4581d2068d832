//! `GET /sitemap.xml`: sitemaps built from the resolver's own rules.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use pagesnap_core::sitemap::{self, SitemapEntry, SitemapScope};
use pagesnap_core::{Hostname, RootId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::pipeline::GenerationError;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "sitemap.xml")]
struct SitemapTemplate {
    entries: Vec<SitemapEntry>,
}

/// Exactly one of the fields selects the scope.
#[derive(Debug, Deserialize)]
pub struct SitemapQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub funnel: Option<String>,
}

impl SitemapQuery {
    fn scope(self) -> Result<SitemapScope> {
        match (self.domain, self.website, self.funnel) {
            (Some(domain), None, None) => Hostname::parse(&domain)
                .map(SitemapScope::Domain)
                .map_err(|e| AppError::BadRequest(e.to_string())),
            (None, Some(website), None) => Ok(SitemapScope::Website(website)),
            (None, None, Some(funnel)) => RootId::parse(&funnel)
                .map(SitemapScope::Funnel)
                .map_err(|e| AppError::BadRequest(e.to_string())),
            _ => Err(AppError::BadRequest(
                "exactly one of domain, website or funnel is required".to_string(),
            )),
        }
    }
}

#[instrument(skip(state))]
pub async fn sitemap(
    State(state): State<AppState>,
    Query(query): Query<SitemapQuery>,
) -> Result<Response> {
    let scope = query.scope()?;
    let entries = sitemap::entries(
        state.service().resolver(),
        &scope,
        &state.config().platform_url,
    )
    .await?;

    let body = SitemapTemplate { entries }
        .render()
        .map_err(GenerationError::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        body,
    )
        .into_response())
}
