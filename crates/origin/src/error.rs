//! Unified error handling with Sentry integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pagesnap_core::{DirectoryError, ErrorKind};
use thiserror::Error;

/// Application-level error type for the origin.
///
/// Content that cannot be found is not an error here; it renders the
/// not-found shell. Only infrastructure failures reach this type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Embedding the hydration payload failed.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Directory(_) => ErrorKind::Unavailable,
            Self::Json(_) => ErrorKind::GenerationFailure,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let event_id = sentry::capture_error(&self);
        tracing::error!(
            error = %self,
            kind = %self.kind(),
            sentry_event_id = %event_id,
            "Request error"
        );

        match self {
            Self::Directory(_) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
            Self::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
        .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
