//! Unified error handling with Sentry integration.
//!
//! Only the sitemap and admin routes return `AppError`. The `/snapshot`
//! route never surfaces an error to a crawler; it fails open to the origin.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pagesnap_core::{DirectoryError, ErrorKind, ResolveError, SnapshotStoreError};
use thiserror::Error;

use crate::pipeline::GenerationError;

/// Application-level error type for the snapshot service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Snapshot cache table failed.
    #[error("Snapshot store error: {0}")]
    Store(#[from] SnapshotStoreError),

    /// Generating HTML failed.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The origin could not be reached while failing open.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong admin token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Directory(e) => Self::Directory(e),
            other => Self::NotFound(other.kind().to_string()),
        }
    }
}

impl AppError {
    /// The taxonomy entry this error is reported under.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Generation(e) => e.kind(),
            Self::NotFound(_) => ErrorKind::ContentNotFound,
            Self::BadRequest(_) | Self::Unauthorized => ErrorKind::UnknownRoute,
            Self::Directory(_) | Self::Store(_) | Self::Upstream(_) => ErrorKind::Unavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Directory(_) | Self::Store(_) | Self::Generation(_) | Self::Upstream(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                kind = %self.kind(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Directory(_) | Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Directory(_) | Self::Store(_) => "Service unavailable".to_string(),
            Self::Generation(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "Upstream error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
