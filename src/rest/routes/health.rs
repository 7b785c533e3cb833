//! Health check and status endpoints.

use axum::{extract::State, Json};

use crate::rest::dto::{HealthResponse, StatusResponse};
use crate::rest::state::ApiState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get service status with backend and session info
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    )
)]
pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.context.persistence.store().name().to_string(),
        open_sessions: state.session_count().await,
        autosave_enabled: state.context.autosave_debounce.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::drafts::{DraftPersistence, MemoryDraftStore};
    use crate::session::SessionContext;
    use crate::submit::MemorySubmissionSink;

    #[tokio::test]
    async fn test_health() {
        let resp = health().await;
        assert_eq!(resp.status, "ok");
        assert!(!resp.version.is_empty());
    }

    #[tokio::test]
    async fn test_status() {
        let persistence = Arc::new(DraftPersistence::new(Arc::new(MemoryDraftStore::new())));
        let context = SessionContext::new(persistence, Arc::new(MemorySubmissionSink::new()));
        let state = ApiState::new(Config::default(), context);

        let resp = status(State(state)).await;
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.store, "memory");
        assert_eq!(resp.open_sessions, 0);
        assert!(!resp.autosave_enabled);
    }
}
