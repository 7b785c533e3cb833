//! Debounced background autosave.
//!
//! Each mounted wizard owns one [`AutosaveHandle`]. Data changes publish the
//! latest state into a watch channel; a background task saves it once no new
//! change has arrived for the debounce delay. Failed saves are logged and
//! retried on the next tick.
//!
//! [`AutosaveHandle::shutdown`] stops the task between saves and waits for a
//! save already in flight to finish. Dropping the handle aborts the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::{DraftKey, DraftPersistence, PersistenceError, SaveOutcome};
use crate::wizard::{StepPayload, WizardState};
use crate::wizards::WizardKind;

pub struct AutosaveHandle<P: StepPayload> {
    key: DraftKey,
    kind: WizardKind,
    persistence: Arc<DraftPersistence>,
    tx: watch::Sender<Option<WizardState<P>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<P: StepPayload> AutosaveHandle<P> {
    /// Start the autosave task for `key`
    pub fn spawn(
        persistence: Arc<DraftPersistence>,
        key: DraftKey,
        kind: WizardKind,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_autosave(
            persistence.clone(),
            key.clone(),
            kind,
            rx,
            shutdown_rx,
            debounce,
        ));
        Self {
            key,
            kind,
            persistence,
            tx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// A handle that never saves in the background; `flush` still works
    pub fn manual(persistence: Arc<DraftPersistence>, key: DraftKey, kind: WizardKind) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            key,
            kind,
            persistence,
            tx,
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    /// Publish the latest state; the task saves it after the debounce delay
    pub fn notify(&self, state: &WizardState<P>) {
        self.tx.send_replace(Some(state.clone()));
    }

    /// Save the latest published state now
    pub async fn flush(&self) -> Result<SaveOutcome, PersistenceError> {
        let latest = self.tx.borrow().clone();
        match latest {
            Some(state) => self.persistence.autosave(&self.key, self.kind, &state).await,
            None => Ok(SaveOutcome::Unchanged),
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop background saving.
    ///
    /// Pending changes are not saved. Returns once the task has exited, so
    /// no background save is in flight afterwards.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(key = %self.key, error = %e, "autosave task ended abnormally");
            }
            tracing::debug!(key = %self.key, "autosave stopped");
        }
    }
}

impl<P: StepPayload> Drop for AutosaveHandle<P> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_autosave<P: StepPayload>(
    persistence: Arc<DraftPersistence>,
    key: DraftKey,
    kind: WizardKind,
    mut rx: watch::Receiver<Option<WizardState<P>>>,
    mut shutdown: oneshot::Receiver<()>,
    debounce: Duration,
) {
    let mut retry_pending = false;
    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            () = tokio::time::sleep(debounce), if retry_pending => {}
        }

        // Wait until edits settle
        loop {
            tokio::select! {
                _ = &mut shutdown => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(debounce) => break,
            }
        }

        let Some(state) = rx.borrow_and_update().clone() else {
            continue;
        };
        // Not raced against shutdown: a started save always completes
        retry_pending = match persistence.autosave(&key, kind, &state).await {
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "autosave failed, retrying on next tick");
                true
            }
        };
    }
}
