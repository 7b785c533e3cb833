//! Step sequencing and navigation for a single wizard run.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::definition::WizardDefinition;
use super::state::WizardState;
use super::step::{payload_from_fields, FieldError, StepId, StepPayload, WizardStep};
use super::WizardError;

/// Result of a navigation action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Navigation {
    /// The current step changed
    Moved { from: StepId, to: StepId },
    /// Nothing to do (first step, unknown or skipped target, same step)
    Unchanged,
    /// Required fields of the current step are missing or invalid
    Blocked { errors: Vec<FieldError> },
    /// Already on the last visible step; submission is the only way forward
    AtTerminal,
}

impl Navigation {
    pub fn moved(&self) -> bool {
        matches!(self, Navigation::Moved { .. })
    }
}

/// Completion summary over the currently visible steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub visible: usize,
    pub percent: u8,
}

/// Owns a wizard's state and drives navigation over its definition
#[derive(Debug)]
pub struct WizardController<P: StepPayload> {
    definition: Arc<WizardDefinition<P>>,
    state: WizardState<P>,
}

impl<P: StepPayload> WizardController<P> {
    /// Start a fresh run on the first non-skipped step
    pub fn new(definition: Arc<WizardDefinition<P>>) -> Result<Self, WizardError> {
        let state = WizardState::at(0);
        Self::resume(definition, state)
    }

    /// Continue from a previously saved state
    pub fn resume(
        definition: Arc<WizardDefinition<P>>,
        mut state: WizardState<P>,
    ) -> Result<Self, WizardError> {
        state.step_data.retain(|id, _| definition.contains(*id));
        state.completed.retain(|id| definition.contains(*id));

        let current_ok = definition
            .step(state.current_step)
            .is_some_and(|s| !s.is_skipped(&state.step_data));
        if !current_ok {
            state.current_step = definition
                .first_visible(&state.step_data)
                .ok_or_else(|| WizardError::NoVisibleStep(definition.name().to_string()))?;
        }

        Ok(Self { definition, state })
    }

    pub fn definition(&self) -> &Arc<WizardDefinition<P>> {
        &self.definition
    }

    pub fn state(&self) -> &WizardState<P> {
        &self.state
    }

    pub fn current_step_id(&self) -> StepId {
        self.state.current_step
    }

    pub fn current_step(&self) -> &WizardStep<P> {
        self.definition
            .step(self.state.current_step)
            .unwrap_or(&self.definition.steps()[0])
    }

    pub fn is_skipped(&self, id: StepId) -> bool {
        self.definition
            .step(id)
            .is_some_and(|s| s.is_skipped(&self.state.step_data))
    }

    pub fn visible_steps(&self) -> Vec<&WizardStep<P>> {
        self.definition.visible(&self.state.step_data).collect()
    }

    /// No visible step follows the current one
    pub fn is_at_terminal(&self) -> bool {
        self.definition
            .next_visible(self.state.current_step, &self.state.step_data)
            .is_none()
    }

    pub fn validate_current(&self) -> Result<(), Vec<FieldError>> {
        let errors = self
            .current_step()
            .validate(self.state.record(self.state.current_step));
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn progress(&self) -> Progress {
        let visible = self.visible_steps();
        let completed = visible
            .iter()
            .filter(|s| self.state.is_completed(s.id))
            .count();
        let percent = if visible.is_empty() {
            0
        } else {
            (completed * 100 / visible.len()) as u8
        };
        Progress {
            completed,
            visible: visible.len(),
            percent,
        }
    }

    /// Mark the current step complete and advance to the next visible step
    pub fn go_next(&mut self) -> Navigation {
        if let Err(errors) = self.validate_current() {
            return Navigation::Blocked { errors };
        }

        let from = self.state.current_step;
        match self.definition.next_visible(from, &self.state.step_data) {
            Some(to) => {
                self.state.completed.insert(from);
                self.state.current_step = to;
                tracing::debug!(wizard = self.definition.name(), from, to, "advanced step");
                Navigation::Moved { from, to }
            }
            None => Navigation::AtTerminal,
        }
    }

    pub fn go_previous(&mut self) -> Navigation {
        let from = self.state.current_step;
        match self.definition.previous_visible(from, &self.state.step_data) {
            Some(to) => {
                self.state.current_step = to;
                Navigation::Moved { from, to }
            }
            None => Navigation::Unchanged,
        }
    }

    /// Jump to any visible step, regardless of what has been completed
    pub fn go_to_step(&mut self, id: StepId) -> Navigation {
        let from = self.state.current_step;
        if id == from || !self.definition.contains(id) || self.is_skipped(id) {
            return Navigation::Unchanged;
        }
        self.state.current_step = id;
        Navigation::Moved { from, to: id }
    }

    /// Merge `patch` into the current step's record.
    ///
    /// A patch with no present keys is a no-op. Present keys overwrite, blank
    /// values included. If the new data makes the current step skipped, the
    /// nearest visible step (forward first) becomes current.
    pub fn update_step_data(&mut self, patch: P) -> Result<(), WizardError> {
        let current = self.state.current_step;
        if patch.step_id() != current {
            return Err(WizardError::StepMismatch {
                expected: current,
                actual: patch.step_id(),
            });
        }
        if patch.present_fields()?.is_empty() {
            return Ok(());
        }

        match self.state.step_data.get_mut(&current) {
            Some(record) => record.merge(patch)?,
            None => {
                self.state.step_data.insert(current, patch);
            }
        }
        self.leave_if_skipped();
        Ok(())
    }

    /// Merge raw field values into the current step's record.
    ///
    /// Same rules as [`update_step_data`](Self::update_step_data), plus
    /// `null` clears a field. An object with no keys is a no-op.
    pub fn update_step_fields(&mut self, fields: Map<String, Value>) -> Result<(), WizardError> {
        if fields.is_empty() {
            return Ok(());
        }
        let current = self.state.current_step;
        let mut record = match self.state.step_data.get(&current) {
            Some(record) => record.clone(),
            None => payload_from_fields(self.current_step().slug, Value::Object(Map::new()))?,
        };
        record.merge_fields(fields)?;
        self.state.step_data.insert(current, record);
        self.leave_if_skipped();
        Ok(())
    }

    fn leave_if_skipped(&mut self) {
        let current = self.state.current_step;
        if !self.is_skipped(current) {
            return;
        }
        let data = &self.state.step_data;
        if let Some(to) = self
            .definition
            .next_visible(current, data)
            .or_else(|| self.definition.previous_visible(current, data))
        {
            tracing::debug!(
                wizard = self.definition.name(),
                from = current,
                to,
                "current step became skipped"
            );
            self.state.current_step = to;
        }
    }

    /// Record the current (terminal) step as complete after a submission
    pub(crate) fn mark_current_complete(&mut self) {
        self.state.completed.insert(self.state.current_step);
    }

    pub fn into_state(self) -> WizardState<P> {
        self.state
    }
}
