//! Generic step-wizard state machine.
//!
//! A wizard is an ordered list of [`WizardStep`]s with typed per-step records.
//! The [`WizardController`] owns the current step, the accumulated data and
//! the set of completed steps, and evaluates every step's skip predicate on
//! each navigation call so the current step is never a skipped one.

use thiserror::Error;

pub mod controller;
pub mod definition;
pub mod state;
pub mod step;

pub use controller::{Navigation, Progress, WizardController};
pub use definition::WizardDefinition;
pub use state::WizardState;
pub use step::{
    payload_from_fields, FieldCheck, FieldError, SkipPredicate, StepData, StepId, StepPayload,
    WizardStep, STEP_TAG,
};

#[cfg(test)]
mod tests;

/// Errors raised by wizard definitions and state updates
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("invalid wizard definition: {0}")]
    InvalidDefinition(String),

    #[error("wizard '{0}' has no visible step")]
    NoVisibleStep(String),

    #[error("data for step {actual} cannot be applied while on step {expected}")]
    StepMismatch { expected: StepId, actual: StepId },

    #[error("unknown wizard '{0}'")]
    UnknownWizard(String),

    #[error("invalid step data: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for WizardError {
    fn from(err: serde_json::Error) -> Self {
        WizardError::Payload(err.to_string())
    }
}
