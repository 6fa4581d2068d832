//! Unified error handling with Sentry integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::proxy::ProxyError;

/// Application-level error type for the edge.
///
/// Only reached when the origin itself cannot answer; snapshot failures
/// never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Proxy(ProxyError::BodyTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Proxy(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::PAYLOAD_TOO_LARGE => "Payload too large",
            _ => "Bad gateway",
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
