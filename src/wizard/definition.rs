//! Ordered step list of a wizard, fixed at construction time.

use std::collections::HashSet;

use super::step::{StepData, StepId, StepPayload, WizardStep};
use super::WizardError;

/// Validated, immutable step list
#[derive(Debug)]
pub struct WizardDefinition<P> {
    name: &'static str,
    steps: Vec<WizardStep<P>>,
}

impl<P: StepPayload> WizardDefinition<P> {
    /// Build a definition, checking ids are >= 1, strictly ascending and
    /// that slugs are unique
    pub fn new(name: &'static str, steps: Vec<WizardStep<P>>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::InvalidDefinition(format!(
                "wizard '{name}' has no steps"
            )));
        }

        let mut previous: StepId = 0;
        let mut slugs = HashSet::new();
        for step in &steps {
            if step.id <= previous {
                return Err(WizardError::InvalidDefinition(format!(
                    "wizard '{name}': step id {} must be greater than {previous}",
                    step.id
                )));
            }
            if !slugs.insert(step.slug) {
                return Err(WizardError::InvalidDefinition(format!(
                    "wizard '{name}': duplicate step slug '{}'",
                    step.slug
                )));
            }
            previous = step.id;
        }

        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[WizardStep<P>] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&WizardStep<P>> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_by_slug(&self, slug: &str) -> Option<&WizardStep<P>> {
        self.steps.iter().find(|s| s.slug == slug)
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.step(id).is_some()
    }

    /// Steps whose skip predicate is false for `data`, in order
    pub fn visible<'a>(&'a self, data: &'a StepData<P>) -> impl Iterator<Item = &'a WizardStep<P>> {
        self.steps.iter().filter(move |s| !s.is_skipped(data))
    }

    pub fn first_visible(&self, data: &StepData<P>) -> Option<StepId> {
        self.visible(data).next().map(|s| s.id)
    }

    /// Next non-skipped step after `id`
    pub fn next_visible(&self, id: StepId, data: &StepData<P>) -> Option<StepId> {
        self.visible(data).find(|s| s.id > id).map(|s| s.id)
    }

    /// Previous non-skipped step before `id`
    pub fn previous_visible(&self, id: StepId, data: &StepData<P>) -> Option<StepId> {
        self.visible(data)
            .filter(|s| s.id < id)
            .last()
            .map(|s| s.id)
    }
}
