//! `POST /admin/events`: content events from the builder.
//!
//! Guarded by `SNAPSHOT_ADMIN_TOKEN`; without a configured token the route
//! answers 404.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::events::{self, ContentEvent, EventOutcome};
use crate::state::AppState;

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    if state.config().admin_token.is_none() {
        return Err(AppError::NotFound("admin routes are disabled".to_string()));
    }
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if state.config().admin_token_matches(token.trim()) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Apply one content event and report what it did.
#[instrument(skip_all)]
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventOutcome>> {
    authorize(&state, &headers)?;
    let event: ContentEvent =
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(events::apply(state.service(), &event).await?))
}
