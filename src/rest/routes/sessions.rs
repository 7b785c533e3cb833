//! Wizard session endpoints.
//!
//! A session is mounted per draft key. Requests against the same key are
//! serialized by the session mutex; navigation and field updates queue an
//! autosave, submit runs the confirm-and-submit flow and unmounts the
//! session once the submission is accepted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::drafts::DraftKey;
use crate::rest::dto::{
    ConfirmRequest, NavigationResponse, OpenSessionRequest, PatchDataRequest, SessionResponse,
    SubmitResponse,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::{parse_key, parse_kind, ApiState};
use crate::wizard::StepId;

/// Open (or resume) a wizard session
#[utoipa::path(
    post,
    path = "/api/v1/wizards/{kind}/sessions",
    tag = "Sessions",
    params(
        ("kind" = String, Path, description = "Wizard kind (onboarding, cpq, payslip)")
    ),
    request_body(content = OpenSessionRequest, description = "Optional draft key to resume"),
    responses(
        (status = 200, description = "Session opened; resumed from a draft when one exists", body = SessionResponse),
        (status = 400, description = "Invalid draft key", body = ErrorResponse),
        (status = 404, description = "Unknown wizard", body = ErrorResponse),
        (status = 409, description = "Key is open in another wizard", body = ErrorResponse),
        (status = 502, description = "Draft store unavailable", body = ErrorResponse)
    )
)]
pub async fn open(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    request: Option<Json<OpenSessionRequest>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let key = match request.key {
        Some(raw) => parse_key(&raw)?,
        None => DraftKey::generate(),
    };

    let session = state.open(kind, key).await?;
    let session = session.lock().await;
    tracing::info!(key = %session.key(), %kind, "session opened");
    Ok(Json(session.snapshot().into()))
}

/// Get the current state of an open session
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{key}",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 404, description = "Session not open", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session(&parse_key(&key)?).await?;
    let session = session.lock().await;
    Ok(Json(session.snapshot().into()))
}

/// Merge field values into the current step
#[utoipa::path(
    patch,
    path = "/api/v1/sessions/{key}/data",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    request_body = PatchDataRequest,
    responses(
        (status = 200, description = "Updated session state", body = SessionResponse),
        (status = 400, description = "Fields do not fit the current step", body = ErrorResponse),
        (status = 404, description = "Session not open", body = ErrorResponse),
        (status = 409, description = "Session already submitted", body = ErrorResponse)
    )
)]
pub async fn patch_data(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    Json(request): Json<PatchDataRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if !request.fields.is_object() {
        return Err(ApiError::ValidationError(
            "fields must be a JSON object".to_string(),
        ));
    }
    let session = state.session(&parse_key(&key)?).await?;
    let mut session = session.lock().await;
    session.update_fields(request.fields)?;
    Ok(Json(session.snapshot().into()))
}

/// Advance to the next visible step
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{key}/next",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Navigation outcome; blocked carries the field errors", body = NavigationResponse),
        (status = 404, description = "Session not open", body = ErrorResponse)
    )
)]
pub async fn next(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let session = state.session(&parse_key(&key)?).await?;
    let mut session = session.lock().await;
    let navigation = session.go_next();
    Ok(Json(NavigationResponse::new(&navigation, session.snapshot())))
}

/// Return to the previous visible step
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{key}/previous",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Navigation outcome", body = NavigationResponse),
        (status = 404, description = "Session not open", body = ErrorResponse)
    )
)]
pub async fn previous(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let session = state.session(&parse_key(&key)?).await?;
    let mut session = session.lock().await;
    let navigation = session.go_previous();
    Ok(Json(NavigationResponse::new(&navigation, session.snapshot())))
}

/// Jump to any visible step
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{key}/goto/{step}",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key"),
        ("step" = u32, Path, description = "Target step id")
    ),
    responses(
        (status = 200, description = "Navigation outcome; unchanged for unknown or skipped steps", body = NavigationResponse),
        (status = 404, description = "Session not open", body = ErrorResponse)
    )
)]
pub async fn go_to(
    State(state): State<ApiState>,
    Path((key, step)): Path<(String, StepId)>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let session = state.session(&parse_key(&key)?).await?;
    let mut session = session.lock().await;
    let navigation = session.go_to_step(step);
    Ok(Json(NavigationResponse::new(&navigation, session.snapshot())))
}

/// Tick or clear the confirmation box
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{key}/confirm",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Updated session state", body = SessionResponse),
        (status = 404, description = "Session not open", body = ErrorResponse)
    )
)]
pub async fn confirm(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session(&parse_key(&key)?).await?;
    let mut session = session.lock().await;
    session.set_confirmed(request.confirmed);
    Ok(Json(session.snapshot().into()))
}

/// Submit the confirmed wizard and unmount its session
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{key}/submit",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 200, description = "Submission accepted; the session is closed", body = SubmitResponse),
        (status = 404, description = "Session not open", body = ErrorResponse),
        (status = 409, description = "Not confirmed or not on the final step", body = ErrorResponse),
        (status = 422, description = "Wizard data incomplete", body = ErrorResponse),
        (status = 502, description = "Submission backend rejected the request", body = ErrorResponse)
    )
)]
pub async fn submit(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let key = parse_key(&key)?;
    let shared = state.session(&key).await?;
    let response = {
        let mut session = shared.lock().await;
        let outcome = session.submit().await?;
        SubmitResponse::new(&outcome, session.snapshot())
    };
    // Nothing more can happen in a submitted session
    state.unmount(&key, &shared).await;
    Ok(Json(response))
}

/// Flush the draft and unmount the session
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{key}",
    tag = "Sessions",
    params(
        ("key" = String, Path, description = "Draft key")
    ),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "Session not open", body = ErrorResponse),
        (status = 502, description = "Final draft save failed", body = ErrorResponse)
    )
)]
pub async fn close(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let key = parse_key(&key)?;
    let session = state
        .remove(&key)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("session '{key}' is not open")))?;
    let mut session = session.lock().await;
    session.close().await?;
    tracing::info!(%key, "session closed");
    Ok(StatusCode::NO_CONTENT)
}
