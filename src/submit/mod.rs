//! Confirmation gate, submission sinks and post-submit hooks.
//!
//! A wizard's final record is only handed to a [`SubmissionSink`] once the
//! user has ticked the confirmation box. After the sink accepts it, every
//! [`CompletionHook`] that handles the wizard kind runs; hook failures are
//! reported alongside the receipt and never undo the submission.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drafts::{DraftKey, StoreError};
use crate::wizard::FieldError;
use crate::wizards::WizardKind;

pub mod file;
pub mod memory;

pub use file::FileSubmissionSink;
pub use memory::MemorySubmissionSink;

/// Explicit confirmation required before a submission is allowed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitGate {
    confirmed: bool,
}

impl SubmitGate {
    pub fn set_confirmed(&mut self, confirmed: bool) {
        self.confirmed = confirmed;
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Depends on the confirmation flag alone
    pub fn can_submit(&self) -> bool {
        self.confirmed
    }
}

/// Final record of a wizard run as handed to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub key: DraftKey,
    pub kind: WizardKind,
    /// The wizard's output record
    pub payload: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
}

/// Backend acknowledgement of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: String,
    pub accepted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            accepted_at: Utc::now(),
        }
    }
}

/// Backend collaborator that accepts final records
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    fn name(&self) -> &str;

    async fn finalize_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, StoreError>;
}

/// Follow-up work run after a submission has been accepted.
///
/// Hooks run in registration order. An error is logged and reported in the
/// [`SubmitOutcome`], but the submission stays accepted.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    /// Hook name (for logging)
    fn name(&self) -> &str;

    /// Whether this hook runs for submissions of `kind`
    fn handles(&self, kind: WizardKind) -> bool;

    async fn on_complete(
        &self,
        submission: &Submission,
        receipt: &SubmissionReceipt,
    ) -> anyhow::Result<()>;
}

/// A completion hook that failed after the submission was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub hook: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub receipt: SubmissionReceipt,
    pub follow_up_errors: Vec<HookFailure>,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("submission requires confirmation")]
    NotConfirmed,

    #[error("submission is only possible from the final step")]
    NotOnFinalStep,

    #[error("this wizard run was already submitted as {0}")]
    AlreadySubmitted(String),

    #[error("wizard data is incomplete ({} field errors)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("backend rejected the submission: {0}")]
    Rejected(#[from] StoreError),

    #[error("failed to encode the final record: {0}")]
    Encode(String),
}

/// Run every hook that handles `submission.kind`, collecting failures
pub async fn run_hooks(
    hooks: &[std::sync::Arc<dyn CompletionHook>],
    submission: &Submission,
    receipt: &SubmissionReceipt,
) -> Vec<HookFailure> {
    let mut failures = Vec::new();
    for hook in hooks.iter().filter(|h| h.handles(submission.kind)) {
        match hook.on_complete(submission, receipt).await {
            Ok(()) => {
                tracing::debug!(hook = hook.name(), receipt = %receipt.id, "completion hook finished");
            }
            Err(e) => {
                tracing::warn!(
                    hook = hook.name(),
                    key = %submission.key,
                    receipt = %receipt.id,
                    error = %e,
                    "completion hook failed"
                );
                failures.push(HookFailure {
                    hook: hook.name().to_string(),
                    message: format!("{e:#}"),
                });
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct RecordingHook {
        name: &'static str,
        kinds: Vec<WizardKind>,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CompletionHook for RecordingHook {
        fn name(&self) -> &str {
            self.name
        }

        fn handles(&self, kind: WizardKind) -> bool {
            self.kinds.contains(&kind)
        }

        async fn on_complete(
            &self,
            _submission: &Submission,
            receipt: &SubmissionReceipt,
        ) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, receipt.id));
            if self.fail {
                anyhow::bail!("mail relay down");
            }
            Ok(())
        }
    }

    fn submission(kind: WizardKind) -> Submission {
        Submission {
            key: DraftKey::new("run-1").unwrap(),
            kind,
            payload: serde_json::json!({}),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_gate_tracks_confirmation_only() {
        let mut gate = SubmitGate::default();
        assert!(!gate.can_submit());
        gate.set_confirmed(true);
        assert!(gate.can_submit());
        gate.set_confirmed(false);
        assert!(!gate.can_submit());
    }

    #[tokio::test]
    async fn test_run_hooks_filters_by_kind_and_collects_failures() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<Arc<dyn CompletionHook>> = vec![
            Arc::new(RecordingHook {
                name: "documents",
                kinds: vec![WizardKind::Payslip],
                fail: false,
                calls: calls.clone(),
            }),
            Arc::new(RecordingHook {
                name: "mail",
                kinds: vec![WizardKind::Payslip],
                fail: true,
                calls: calls.clone(),
            }),
            Arc::new(RecordingHook {
                name: "crm",
                kinds: vec![WizardKind::Onboarding],
                fail: false,
                calls: calls.clone(),
            }),
        ];

        let receipt = SubmissionReceipt::new("sub-9");
        let failures = run_hooks(&hooks, &submission(WizardKind::Payslip), &receipt).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["documents:sub-9".to_string(), "mail:sub-9".to_string()]
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].hook, "mail");
        assert!(failures[0].message.contains("mail relay down"));
    }
}
