//! The application shell served to browsers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use pagesnap_core::ErrorKind;
use tracing::{Span, instrument};

use crate::error::Result;
use crate::hydration::{Landing, Provenance, embed, land};
use crate::routes::public_host;
use crate::state::AppState;

/// Diagnostic header: `hydrated` or `resolved`.
pub const CONTENT_HEADER: HeaderName = HeaderName::from_static("x-pagesnap-content");

/// Diagnostic header naming why nothing was found.
pub const ERROR_HEADER: HeaderName = HeaderName::from_static("x-pagesnap-error");

/// Application shell template.
#[derive(Template, WebTemplate)]
#[template(path = "shell.html")]
pub struct ShellTemplate {
    pub title: String,
    pub asset_base: String,
    /// Escaped `ContentRef` JSON the client reads once on first paint.
    pub hydration: Option<String>,
    pub error_kind: Option<&'static str>,
}

/// Serve the shell for any path.
///
/// # Errors
///
/// Returns an error if the directory is unreachable.
#[instrument(skip_all, fields(path = %uri.path(), host = tracing::field::Empty))]
pub async fn shell(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let asset_base = state.config().asset_base.clone();
    let Some(host) = public_host(&headers) else {
        return Ok(not_found(asset_base, ErrorKind::UnknownRoute));
    };
    Span::current().record("host", host.as_str());

    let path = uri.path();
    match land(&state, &host, path, &headers).await? {
        Landing::Content {
            content,
            title,
            provenance,
        } => {
            let template = ShellTemplate {
                title,
                asset_base,
                hydration: Some(embed(&content)?),
                error_kind: None,
            };
            let provenance = match provenance {
                Provenance::Hydrated => "hydrated",
                Provenance::Resolved => "resolved",
            };
            Ok((
                [
                    (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
                    (CONTENT_HEADER, HeaderValue::from_static(provenance)),
                ],
                template,
            )
                .into_response())
        }
        Landing::Redirect(url) => Ok(Redirect::temporary(url.as_str()).into_response()),
        Landing::NotFound(kind) => Ok(not_found(asset_base, kind)),
    }
}

fn not_found(asset_base: String, kind: ErrorKind) -> Response {
    let template = ShellTemplate {
        title: "Page not found".to_string(),
        asset_base,
        hydration: None,
        error_kind: Some(kind.as_str()),
    };
    (
        StatusCode::NOT_FOUND,
        [(ERROR_HEADER, HeaderValue::from_static(kind.as_str()))],
        template,
    )
        .into_response()
}
