//! Data Transfer Objects for the REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::drafts::{DraftRecord, DraftStatus};
use crate::session::{SessionSnapshot, StepStatus};
use crate::submit::{HookFailure, SubmissionReceipt, SubmitOutcome};
use crate::wizard::{FieldError, Navigation};
use crate::wizards::{DefinitionSummary, StepSummary};

// =============================================================================
// Health DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    /// Draft store in use (file, memory, hosted)
    pub store: String,
    pub open_sessions: usize,
    pub autosave_enabled: bool,
}

// =============================================================================
// Wizard definition DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepSummaryResponse {
    pub id: u32,
    pub slug: String,
    pub title: String,
    pub required: Vec<String>,
    /// Step has a skip rule
    pub conditional: bool,
}

impl From<&StepSummary> for StepSummaryResponse {
    fn from(s: &StepSummary) -> Self {
        Self {
            id: s.id,
            slug: s.slug.to_string(),
            title: s.title.to_string(),
            required: s.required.iter().map(ToString::to_string).collect(),
            conditional: s.conditional,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WizardResponse {
    pub kind: String,
    pub title: String,
    pub steps: Vec<StepSummaryResponse>,
}

impl From<DefinitionSummary> for WizardResponse {
    fn from(d: DefinitionSummary) -> Self {
        Self {
            kind: d.kind.to_string(),
            title: d.title.to_string(),
            steps: d.steps.iter().map(StepSummaryResponse::from).collect(),
        }
    }
}

// =============================================================================
// Session DTOs
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    /// Draft key to resume; a new key is generated when omitted
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatchDataRequest {
    /// Field values for the current step; null leaves a field unchanged
    #[schema(value_type = Object)]
    pub fields: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldErrorResponse {
    pub field: String,
    pub message: String,
}

impl From<&FieldError> for FieldErrorResponse {
    fn from(e: &FieldError) -> Self {
        Self {
            field: e.field.clone(),
            message: e.message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepStatusResponse {
    pub id: u32,
    pub slug: String,
    pub title: String,
    pub skipped: bool,
    pub completed: bool,
    pub current: bool,
    pub required: Vec<String>,
}

impl From<&StepStatus> for StepStatusResponse {
    fn from(s: &StepStatus) -> Self {
        Self {
            id: s.id,
            slug: s.slug.to_string(),
            title: s.title.to_string(),
            skipped: s.skipped,
            completed: s.completed,
            current: s.current,
            required: s.required.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressResponse {
    pub completed: usize,
    pub visible: usize,
    pub percent: u8,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptResponse {
    pub id: String,
    pub accepted_at: String,
}

impl From<&SubmissionReceipt> for ReceiptResponse {
    fn from(r: &SubmissionReceipt) -> Self {
        Self {
            id: r.id.clone(),
            accepted_at: r.accepted_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub key: String,
    pub kind: String,
    pub current_step: u32,
    pub current_slug: String,
    pub steps: Vec<StepStatusResponse>,
    /// Filled-in fields per step slug
    #[schema(value_type = Object)]
    pub data: Value,
    pub progress: ProgressResponse,
    pub at_terminal: bool,
    pub confirmed: bool,
    pub can_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<ReceiptResponse>,
    pub resumed: bool,
    pub validation: Vec<FieldErrorResponse>,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(s: SessionSnapshot) -> Self {
        Self {
            key: s.key.to_string(),
            kind: s.kind.to_string(),
            current_step: s.current_step,
            current_slug: s.current_slug.to_string(),
            steps: s.steps.iter().map(StepStatusResponse::from).collect(),
            data: s.data,
            progress: ProgressResponse {
                completed: s.progress.completed,
                visible: s.progress.visible,
                percent: s.progress.percent,
            },
            at_terminal: s.at_terminal,
            confirmed: s.confirmed,
            can_submit: s.can_submit,
            submitted: s.submitted.as_ref().map(ReceiptResponse::from),
            resumed: s.resumed,
            validation: s.validation.iter().map(FieldErrorResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NavigationResponse {
    /// moved, unchanged, blocked or at_terminal
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldErrorResponse>,
    pub session: SessionResponse,
}

impl NavigationResponse {
    pub fn new(navigation: &Navigation, snapshot: SessionSnapshot) -> Self {
        let (outcome, from, to, errors) = match navigation {
            Navigation::Moved { from, to } => ("moved", Some(*from), Some(*to), Vec::new()),
            Navigation::Unchanged => ("unchanged", None, None, Vec::new()),
            Navigation::Blocked { errors } => (
                "blocked",
                None,
                None,
                errors.iter().map(FieldErrorResponse::from).collect(),
            ),
            Navigation::AtTerminal => ("at_terminal", None, None, Vec::new()),
        };
        Self {
            outcome: outcome.to_string(),
            from,
            to,
            errors,
            session: snapshot.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HookFailureResponse {
    pub hook: String,
    pub message: String,
}

impl From<&HookFailure> for HookFailureResponse {
    fn from(f: &HookFailure) -> Self {
        Self {
            hook: f.hook.clone(),
            message: f.message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub receipt: ReceiptResponse,
    /// Post-submit work that failed; the submission itself stands
    pub follow_up_errors: Vec<HookFailureResponse>,
    pub session: SessionResponse,
}

impl SubmitResponse {
    pub fn new(outcome: &SubmitOutcome, snapshot: SessionSnapshot) -> Self {
        Self {
            receipt: ReceiptResponse::from(&outcome.receipt),
            follow_up_errors: outcome
                .follow_up_errors
                .iter()
                .map(HookFailureResponse::from)
                .collect(),
            session: snapshot.into(),
        }
    }
}

// =============================================================================
// Draft DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DraftSummary {
    pub key: String,
    pub kind: String,
    pub current_step: u32,
    pub status: String,
    pub updated_at: String,
}

fn status_str(status: DraftStatus) -> &'static str {
    match status {
        DraftStatus::Draft => "draft",
        DraftStatus::Complete => "complete",
    }
}

impl From<&DraftRecord> for DraftSummary {
    fn from(r: &DraftRecord) -> Self {
        Self {
            key: r.key.to_string(),
            kind: r.kind.to_string(),
            current_step: r.current_step,
            status: status_str(r.status).to_string(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DraftResponse {
    pub key: String,
    pub kind: String,
    pub current_step: u32,
    pub status: String,
    pub updated_at: String,
    /// Stored step data, keyed by step id
    #[schema(value_type = Object)]
    pub data: Value,
}

impl From<DraftRecord> for DraftResponse {
    fn from(r: DraftRecord) -> Self {
        Self {
            key: r.key.to_string(),
            kind: r.kind.to_string(),
            current_step: r.current_step,
            status: status_str(r.status).to_string(),
            updated_at: r.updated_at.to_rfc3339(),
            data: r.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_summary_from_record() {
        let record = DraftRecord {
            key: crate::drafts::DraftKey::new("client-7").unwrap(),
            kind: crate::wizards::WizardKind::Onboarding,
            current_step: 3,
            data: serde_json::json!({}),
            status: DraftStatus::Complete,
            updated_at: chrono::Utc::now(),
        };
        let summary = DraftSummary::from(&record);
        assert_eq!(summary.key, "client-7");
        assert_eq!(summary.kind, "onboarding");
        assert_eq!(summary.status, "complete");
    }

    #[test]
    fn test_wizard_response_from_summary() {
        let summary = crate::wizards::describe(crate::wizards::WizardKind::Cpq).unwrap();
        let response = WizardResponse::from(summary);
        assert_eq!(response.kind, "cpq");
        assert!(response
            .steps
            .iter()
            .any(|s| s.slug == "payroll_plan" && s.conditional));
    }
}
