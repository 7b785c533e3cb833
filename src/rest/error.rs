//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::drafts::{PersistenceError, StoreError};
use crate::rest::dto::FieldErrorResponse;
use crate::session::SessionError;
use crate::submit::SubmitError;
use crate::wizard::WizardError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found
    NotFound(String),
    /// Validation error
    ValidationError(String),
    /// Request conflicts with the session's state
    Conflict(String),
    /// Wizard data is incomplete or invalid
    Unprocessable {
        message: String,
        fields: Vec<FieldErrorResponse>,
    },
    /// The draft store or submission backend failed
    BadGateway(String),
    /// Internal server error
    InternalError(String),
    /// Bad request
    BadRequest(String),
}

/// Error response body
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorResponse>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, fields) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, Vec::new()),
            ApiError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg, Vec::new())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, Vec::new()),
            ApiError::Unprocessable { message, fields } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_data",
                message,
                fields,
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "backend_error", msg, Vec::new()),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                Vec::new(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, Vec::new()),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %message, "request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
                fields,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey(_) => ApiError::ValidationError(err.to_string()),
            StoreError::Io(_) | StoreError::Serialization(_) => {
                ApiError::InternalError(err.to_string())
            }
            StoreError::Unauthorized | StoreError::Http { .. } | StoreError::Network(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::UnknownWizard(_) => ApiError::NotFound(err.to_string()),
            WizardError::StepMismatch { .. } | WizardError::Payload(_) => {
                ApiError::BadRequest(err.to_string())
            }
            WizardError::InvalidDefinition(_) | WizardError::NoVisibleStep(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Store(e) => e.into(),
            PersistenceError::Wizard(e) => e.into(),
            PersistenceError::KindMismatch { .. } => ApiError::Conflict(err.to_string()),
            PersistenceError::Corrupt { .. } => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Wizard(e) => e.into(),
            SessionError::Persistence(e) => e.into(),
            SessionError::Submitted(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::NotConfirmed
            | SubmitError::NotOnFinalStep
            | SubmitError::AlreadySubmitted(_) => ApiError::Conflict(err.to_string()),
            SubmitError::Invalid(errors) => ApiError::Unprocessable {
                message: format!("wizard data is incomplete ({} field errors)", errors.len()),
                fields: errors.iter().map(FieldErrorResponse::from).collect(),
            },
            SubmitError::Rejected(e) => ApiError::BadGateway(e.to_string()),
            SubmitError::Encode(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::FieldError;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_not_found_response() {
        let error = ApiError::NotFound("session 'abc' not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.error, "not_found");
        assert!(json.fields.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_submission_lists_fields() {
        let error: ApiError =
            SubmitError::Invalid(vec![FieldError::required("client.company_name")]).into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.fields[0].field, "client.company_name");
    }

    #[test]
    fn test_backend_failures_map_to_bad_gateway() {
        let error: ApiError = SubmitError::Rejected(StoreError::Network("reset".into())).into();
        assert!(matches!(error, ApiError::BadGateway(_)));

        let error: ApiError = PersistenceError::Store(StoreError::Unauthorized).into();
        assert!(matches!(error, ApiError::BadGateway(_)));
    }

    #[test]
    fn test_double_submit_is_conflict() {
        let error: ApiError = SubmitError::AlreadySubmitted("sub-1".into()).into();
        assert!(matches!(error, ApiError::Conflict(_)));
    }
}
