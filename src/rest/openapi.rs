//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    ConfirmRequest, DraftResponse, DraftSummary, FieldErrorResponse, HealthResponse,
    HookFailureResponse, NavigationResponse, OpenSessionRequest, PatchDataRequest,
    ProgressResponse, ReceiptResponse, SessionResponse, StatusResponse, StepStatusResponse,
    StepSummaryResponse, SubmitResponse, WizardResponse,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the back-office wizards REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Back-office Wizards API",
        description = "REST API for client onboarding, quotes and payslip runs as resumable multi-step wizards."
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::status,
        // Wizard endpoints
        crate::rest::routes::wizards::list,
        crate::rest::routes::wizards::get_one,
        // Session endpoints
        crate::rest::routes::sessions::open,
        crate::rest::routes::sessions::get_one,
        crate::rest::routes::sessions::patch_data,
        crate::rest::routes::sessions::next,
        crate::rest::routes::sessions::previous,
        crate::rest::routes::sessions::go_to,
        crate::rest::routes::sessions::confirm,
        crate::rest::routes::sessions::submit,
        crate::rest::routes::sessions::close,
        // Draft endpoints
        crate::rest::routes::drafts::list,
        crate::rest::routes::drafts::get_one,
        crate::rest::routes::drafts::delete,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            StatusResponse,
            WizardResponse,
            StepSummaryResponse,
            SessionResponse,
            StepStatusResponse,
            ProgressResponse,
            FieldErrorResponse,
            NavigationResponse,
            SubmitResponse,
            ReceiptResponse,
            HookFailureResponse,
            DraftSummary,
            DraftResponse,
            ErrorResponse,
            // Request types
            OpenSessionRequest,
            PatchDataRequest,
            ConfirmRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check and status endpoints"),
        (name = "Wizards", description = "Wizard definitions"),
        (name = "Sessions", description = "Step navigation, field updates and submission"),
        (name = "Drafts", description = "Saved wizard drafts"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("Back-office Wizards API"));
        assert!(spec.contains("/api/v1/health"));
        assert!(spec.contains("/api/v1/sessions/{key}/submit"));
        assert!(spec.contains("/api/v1/drafts/{key}"));
    }

    #[test]
    fn test_openapi_has_all_tags() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("\"Health\""));
        assert!(spec.contains("\"Wizards\""));
        assert!(spec.contains("\"Sessions\""));
        assert!(spec.contains("\"Drafts\""));
    }
}
