use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::step::{StepData, StepId, StepPayload};

/// Mutable progress of one wizard run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "P: StepPayload")]
pub struct WizardState<P> {
    pub current_step: StepId,
    #[serde(default)]
    pub step_data: StepData<P>,
    #[serde(default)]
    pub completed: BTreeSet<StepId>,
}

impl<P: StepPayload> WizardState<P> {
    pub fn at(step: StepId) -> Self {
        Self {
            current_step: step,
            step_data: StepData::new(),
            completed: BTreeSet::new(),
        }
    }

    pub fn record(&self, step: StepId) -> Option<&P> {
        self.step_data.get(&step)
    }

    pub fn is_completed(&self, step: StepId) -> bool {
        self.completed.contains(&step)
    }
}
