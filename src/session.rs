//! A mounted wizard: controller, autosave, confirmation gate and backend.
//!
//! [`WizardSession`] is the typed form used by code that knows the wizard.
//! [`DynSession`] erases the wizard type so the REST layer can drive any
//! session through JSON patches and snapshots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::HostedBackend;
use crate::config::{BackendKind, Config};
use crate::drafts::{
    AutosaveHandle, DraftKey, DraftPersistence, DraftStore, FileDraftStore, MemoryDraftStore,
    PersistenceError, SaveOutcome,
};
use crate::submit::{
    run_hooks, CompletionHook, FileSubmissionSink, MemorySubmissionSink, SubmissionReceipt,
    Submission, SubmissionSink, SubmitError, SubmitGate, SubmitOutcome,
};
use crate::wizard::{
    FieldError, Navigation, Progress, StepId, StepPayload, WizardController,
    WizardError, WizardState,
};
use crate::wizards::payslip::PayslipDispatcher;
use crate::wizards::{Wizard, WizardKind};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("session '{0}' was already submitted")]
    Submitted(DraftKey),
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub persistence: Arc<DraftPersistence>,
    pub sink: Arc<dyn SubmissionSink>,
    pub hooks: Vec<Arc<dyn CompletionHook>>,
    /// Autosave quiet period; `None` saves only on explicit flush
    pub autosave_debounce: Option<Duration>,
}

impl SessionContext {
    pub fn new(persistence: Arc<DraftPersistence>, sink: Arc<dyn SubmissionSink>) -> Self {
        Self {
            persistence,
            sink,
            hooks: Vec::new(),
            autosave_debounce: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_autosave(mut self, debounce: Option<Duration>) -> Self {
        self.autosave_debounce = debounce;
        self
    }

    /// Wire stores, sink and hooks from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (store, sink): (Arc<dyn DraftStore>, Arc<dyn SubmissionSink>) =
            match config.backend.kind {
                BackendKind::File => (
                    Arc::new(FileDraftStore::new(config.drafts_path())),
                    Arc::new(FileSubmissionSink::new(config.submissions_path())),
                ),
                BackendKind::Memory => (
                    Arc::new(MemoryDraftStore::new()),
                    Arc::new(MemorySubmissionSink::new()),
                ),
                BackendKind::Hosted => {
                    let backend = Arc::new(
                        HostedBackend::from_config(&config.backend)
                            .context("Failed to configure hosted backend")?,
                    );
                    (backend.clone(), backend)
                }
            };
        info!(store = store.name(), sink = sink.name(), "session backend ready");

        let persistence = Arc::new(DraftPersistence::from_config(store, &config.drafts));
        Ok(Self::new(persistence, sink)
            .with_autosave(config.autosave_debounce())
            .with_hook(Arc::new(PayslipDispatcher::from_config(config))))
    }
}

/// Display state of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub id: StepId,
    pub slug: &'static str,
    pub title: &'static str,
    pub skipped: bool,
    pub completed: bool,
    pub current: bool,
    pub required: Vec<&'static str>,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub key: DraftKey,
    pub kind: WizardKind,
    pub current_step: StepId,
    pub current_slug: &'static str,
    pub steps: Vec<StepStatus>,
    /// Filled-in fields per step, keyed by step slug
    pub data: Value,
    pub progress: Progress,
    pub at_terminal: bool,
    pub confirmed: bool,
    pub can_submit: bool,
    pub submitted: Option<SubmissionReceipt>,
    pub resumed: bool,
    /// Outstanding errors on the current step
    pub validation: Vec<FieldError>,
}

pub struct WizardSession<W: Wizard> {
    key: DraftKey,
    controller: WizardController<W::Step>,
    autosave: AutosaveHandle<W::Step>,
    gate: SubmitGate,
    receipt: Option<SubmissionReceipt>,
    resumed: bool,
    context: SessionContext,
}

impl<W: Wizard> WizardSession<W> {
    /// Resume the draft stored under `key`, or start a fresh run
    pub async fn open(key: DraftKey, context: SessionContext) -> Result<Self, SessionError> {
        let definition = Arc::new(W::definition()?);
        let draft = context
            .persistence
            .load_draft(&key, W::KIND, &definition)
            .await?;
        let resumed = draft.is_some();
        let controller = match draft {
            Some(state) => WizardController::resume(definition, state)?,
            None => WizardController::new(definition)?,
        };

        let autosave = match context.autosave_debounce {
            Some(debounce) => {
                AutosaveHandle::spawn(context.persistence.clone(), key.clone(), W::KIND, debounce)
            }
            None => AutosaveHandle::manual(context.persistence.clone(), key.clone(), W::KIND),
        };
        info!(key = %key, kind = %W::KIND, resumed, step = controller.current_step_id(), "session opened");

        Ok(Self {
            key,
            controller,
            autosave,
            gate: SubmitGate::default(),
            receipt: None,
            resumed,
            context,
        })
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn controller(&self) -> &WizardController<W::Step> {
        &self.controller
    }

    pub fn state(&self) -> &WizardState<W::Step> {
        self.controller.state()
    }

    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.receipt.is_some()
    }

    pub fn update_step_data(&mut self, patch: W::Step) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted(self.key.clone()));
        }
        self.controller.update_step_data(patch)?;
        self.autosave.notify(self.controller.state());
        Ok(())
    }

    /// Merge raw field values into the current step; `null` clears a field
    pub fn update_step_fields(&mut self, fields: Map<String, Value>) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted(self.key.clone()));
        }
        self.controller.update_step_fields(fields)?;
        self.autosave.notify(self.controller.state());
        Ok(())
    }

    fn navigate(
        &mut self,
        step: impl FnOnce(&mut WizardController<W::Step>) -> Navigation,
    ) -> Navigation {
        if self.is_submitted() {
            return Navigation::Unchanged;
        }
        let outcome = step(&mut self.controller);
        if outcome.moved() {
            self.autosave.notify(self.controller.state());
        }
        outcome
    }

    pub fn go_next(&mut self) -> Navigation {
        self.navigate(WizardController::go_next)
    }

    pub fn go_previous(&mut self) -> Navigation {
        self.navigate(WizardController::go_previous)
    }

    pub fn go_to_step(&mut self, id: StepId) -> Navigation {
        self.navigate(|c| c.go_to_step(id))
    }

    pub fn set_confirmed(&mut self, confirmed: bool) {
        self.gate.set_confirmed(confirmed);
    }

    pub fn can_submit(&self) -> bool {
        self.gate.can_submit()
    }

    /// Save the current state now, bypassing the debounce
    pub async fn save_now(&self) -> Result<SaveOutcome, PersistenceError> {
        self.autosave.notify(self.controller.state());
        self.autosave.flush().await
    }

    /// Finalize the run and hand it to the submission sink.
    ///
    /// Nothing changes unless the sink accepts the record. After that the
    /// terminal step is marked complete, autosave stops, the draft is retired
    /// and completion hooks run.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        if let Some(receipt) = &self.receipt {
            return Err(SubmitError::AlreadySubmitted(receipt.id.clone()));
        }
        if !self.gate.can_submit() {
            return Err(SubmitError::NotConfirmed);
        }
        if !self.controller.is_at_terminal() {
            return Err(SubmitError::NotOnFinalStep);
        }

        let output = W::finalize(&self.controller.state().step_data).map_err(SubmitError::Invalid)?;
        let submission = Submission {
            key: self.key.clone(),
            kind: W::KIND,
            payload: serde_json::to_value(&output).map_err(|e| SubmitError::Encode(e.to_string()))?,
            submitted_at: Utc::now(),
        };

        let receipt = match self.context.sink.finalize_submission(&submission).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(key = %self.key, sink = self.context.sink.name(), error = %e, "submission rejected");
                return Err(e.into());
            }
        };
        self.receipt = Some(receipt.clone());
        self.controller.mark_current_complete();
        // A background save still running would recreate the retired draft
        self.autosave.shutdown().await;

        if let Err(e) = self
            .context
            .persistence
            .save_final(&self.key, W::KIND, self.controller.state())
            .await
        {
            warn!(key = %self.key, error = %e, "failed to retire draft after submission");
        }
        info!(key = %self.key, kind = %W::KIND, receipt = %receipt.id, "wizard submitted");

        let follow_up_errors = run_hooks(&self.context.hooks, &submission, &receipt).await;
        Ok(SubmitOutcome {
            receipt,
            follow_up_errors,
        })
    }

    /// Flush the latest state and stop autosaving (unmount)
    pub async fn close(&mut self) -> Result<(), PersistenceError> {
        self.autosave.shutdown().await;
        let result = if self.is_submitted() {
            Ok(())
        } else {
            self.save_now().await.map(|_| ())
        };
        self.context.persistence.release(&self.key).await;
        result
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.controller.state();
        let current = self.controller.current_step();

        let steps = self
            .controller
            .definition()
            .steps()
            .iter()
            .map(|s| StepStatus {
                id: s.id,
                slug: s.slug,
                title: s.title,
                skipped: s.is_skipped(&state.step_data),
                completed: state.is_completed(s.id),
                current: s.id == state.current_step,
                required: s.required_fields().to_vec(),
            })
            .collect();

        let mut data = Map::new();
        for step in self.controller.definition().steps() {
            if let Some(fields) = state.record(step.id).and_then(|r| r.fields().ok()) {
                data.insert(step.slug.to_string(), Value::Object(fields));
            }
        }

        SessionSnapshot {
            key: self.key.clone(),
            kind: W::KIND,
            current_step: state.current_step,
            current_slug: current.slug,
            steps,
            data: Value::Object(data),
            progress: self.controller.progress(),
            at_terminal: self.controller.is_at_terminal(),
            confirmed: self.gate.is_confirmed(),
            can_submit: self.gate.can_submit(),
            submitted: self.receipt.clone(),
            resumed: self.resumed,
            validation: self.controller.validate_current().err().unwrap_or_default(),
        }
    }
}

/// Type-erased session driven with JSON
#[async_trait]
pub trait DynSession: Send {
    fn kind(&self) -> WizardKind;

    fn key(&self) -> &DraftKey;

    fn snapshot(&self) -> SessionSnapshot;

    /// Merge an object of field values into the current step
    fn update_fields(&mut self, fields: Value) -> Result<(), SessionError>;

    fn go_next(&mut self) -> Navigation;

    fn go_previous(&mut self) -> Navigation;

    fn go_to_step(&mut self, id: StepId) -> Navigation;

    fn set_confirmed(&mut self, confirmed: bool);

    async fn submit(&mut self) -> Result<SubmitOutcome, SubmitError>;

    async fn close(&mut self) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<W: Wizard> DynSession for WizardSession<W> {
    fn kind(&self) -> WizardKind {
        W::KIND
    }

    fn key(&self) -> &DraftKey {
        &self.key
    }

    fn snapshot(&self) -> SessionSnapshot {
        WizardSession::snapshot(self)
    }

    fn update_fields(&mut self, fields: Value) -> Result<(), SessionError> {
        match fields {
            Value::Object(fields) => self.update_step_fields(fields),
            Value::Null => self.update_step_fields(Map::new()),
            other => Err(WizardError::Payload(format!(
                "expected an object of field values, got {other}"
            ))
            .into()),
        }
    }

    fn go_next(&mut self) -> Navigation {
        WizardSession::go_next(self)
    }

    fn go_previous(&mut self) -> Navigation {
        WizardSession::go_previous(self)
    }

    fn go_to_step(&mut self, id: StepId) -> Navigation {
        WizardSession::go_to_step(self, id)
    }

    fn set_confirmed(&mut self, confirmed: bool) {
        WizardSession::set_confirmed(self, confirmed);
    }

    async fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        WizardSession::submit(self).await
    }

    async fn close(&mut self) -> Result<(), PersistenceError> {
        WizardSession::close(self).await
    }
}
