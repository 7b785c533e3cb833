//! The concrete wizards: client onboarding, CPQ quoting and payslip runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::drafts::DraftKey;
use crate::session::{DynSession, SessionContext, SessionError, WizardSession};
use crate::wizard::{FieldError, StepData, StepId, StepPayload, WizardDefinition, WizardError};

pub mod cpq;
pub mod onboarding;
pub mod payslip;
mod validate;

pub use cpq::QuoteWizard;
pub use onboarding::OnboardingWizard;
pub use payslip::PayslipWizard;

/// Which wizard a session or draft belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardKind {
    /// Client onboarding
    Onboarding,
    /// Configure-price-quote
    Cpq,
    /// Monthly payslip generation
    Payslip,
}

impl WizardKind {
    pub fn all() -> &'static [WizardKind] {
        &[WizardKind::Onboarding, WizardKind::Cpq, WizardKind::Payslip]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WizardKind::Onboarding => "onboarding",
            WizardKind::Cpq => "cpq",
            WizardKind::Payslip => "payslip",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardKind::Onboarding => "Client onboarding",
            WizardKind::Cpq => "Quote builder",
            WizardKind::Payslip => "Payslip generation",
        }
    }
}

impl fmt::Display for WizardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WizardKind {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WizardKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| WizardError::UnknownWizard(s.to_string()))
    }
}

/// A wizard instance: its steps and how its data becomes a final record
pub trait Wizard: Send + Sync + 'static {
    type Step: StepPayload;
    type Output: Serialize + Send;

    const KIND: WizardKind;

    fn definition() -> Result<WizardDefinition<Self::Step>, WizardError>;

    /// Turn the accumulated step data into the record handed to the backend
    fn finalize(data: &StepData<Self::Step>) -> Result<Self::Output, Vec<FieldError>>;
}

/// Serializable outline of a wizard definition
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionSummary {
    pub kind: WizardKind,
    pub title: &'static str,
    pub steps: Vec<StepSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub id: StepId,
    pub slug: &'static str,
    pub title: &'static str,
    pub required: Vec<&'static str>,
    /// Step has a skip rule and may be bypassed
    pub conditional: bool,
}

fn summarize<W: Wizard>() -> Result<DefinitionSummary, WizardError> {
    let definition = W::definition()?;
    Ok(DefinitionSummary {
        kind: W::KIND,
        title: W::KIND.title(),
        steps: definition
            .steps()
            .iter()
            .map(|s| StepSummary {
                id: s.id,
                slug: s.slug,
                title: s.title,
                required: s.required_fields().to_vec(),
                conditional: s.has_skip_rule(),
            })
            .collect(),
    })
}

pub fn describe(kind: WizardKind) -> Result<DefinitionSummary, WizardError> {
    match kind {
        WizardKind::Onboarding => summarize::<OnboardingWizard>(),
        WizardKind::Cpq => summarize::<QuoteWizard>(),
        WizardKind::Payslip => summarize::<PayslipWizard>(),
    }
}

/// Mount a session of the given wizard kind, resuming its draft if present
pub async fn open_session(
    kind: WizardKind,
    key: DraftKey,
    context: SessionContext,
) -> Result<Box<dyn DynSession>, SessionError> {
    Ok(match kind {
        WizardKind::Onboarding => {
            Box::new(WizardSession::<OnboardingWizard>::open(key, context).await?)
        }
        WizardKind::Cpq => Box::new(WizardSession::<QuoteWizard>::open(key, context).await?),
        WizardKind::Payslip => Box::new(WizardSession::<PayslipWizard>::open(key, context).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in WizardKind::all() {
            assert_eq!(kind.as_str().parse::<WizardKind>().unwrap(), *kind);
        }
        assert_eq!("CPQ".parse::<WizardKind>().unwrap(), WizardKind::Cpq);
        assert!("invoice".parse::<WizardKind>().is_err());
    }

    #[test]
    fn test_all_definitions_build() {
        for kind in WizardKind::all() {
            let summary = describe(*kind).unwrap();
            assert!(!summary.steps.is_empty());
            assert_eq!(summary.steps[0].id, 1);
            assert!(summary.steps.iter().any(|s| s.conditional));
        }
    }
}
