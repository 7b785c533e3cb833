//! Stored draft endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::rest::dto::{DraftResponse, DraftSummary};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::{parse_key, ApiState};

/// List stored drafts, most recently updated first
#[utoipa::path(
    get,
    path = "/api/v1/drafts",
    tag = "Drafts",
    responses(
        (status = 200, description = "Stored drafts", body = Vec<DraftSummary>),
        (status = 502, description = "Draft store unavailable", body = ErrorResponse)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<DraftSummary>>, ApiError> {
    let drafts = state.context.persistence.list_drafts().await?;
    Ok(Json(drafts.iter().map(DraftSummary::from).collect()))
}

/// Get a stored draft with its data
#[utoipa::path(
    get,
    path = "/api/v1/drafts/{key}",
    tag = "Drafts",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Draft record", body = DraftResponse),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<DraftResponse>, ApiError> {
    let key = parse_key(&key)?;
    let record = state
        .context
        .persistence
        .fetch_draft(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("draft '{key}' not found")))?;
    Ok(Json(record.into()))
}

/// Discard a stored draft
#[utoipa::path(
    delete,
    path = "/api/v1/drafts/{key}",
    tag = "Drafts",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 404, description = "Draft not found", body = ErrorResponse),
        (status = 409, description = "Draft belongs to an open session", body = ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let key = parse_key(&key)?;
    if state.session(&key).await.is_ok() {
        return Err(ApiError::Conflict(format!(
            "draft '{key}' belongs to an open session; close it first"
        )));
    }
    if !state.context.persistence.delete_draft(&key).await? {
        return Err(ApiError::NotFound(format!("draft '{key}' not found")));
    }
    tracing::info!(%key, "draft deleted");
    Ok(StatusCode::NO_CONTENT)
}
