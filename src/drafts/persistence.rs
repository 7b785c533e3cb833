//! Checkpointing of wizard progress into a [`DraftStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{DraftKey, DraftRecord, DraftStatus, DraftStore, StoreError};
use crate::config::DraftsConfig;
use crate::wizard::{StepData, StepPayload, WizardDefinition, WizardError, WizardState};
use crate::wizards::WizardKind;

/// Errors from saving or restoring drafts
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("draft '{key}' belongs to the {found} wizard, not {expected}")]
    KindMismatch {
        key: DraftKey,
        expected: WizardKind,
        found: WizardKind,
    },

    #[error("draft '{key}' is unreadable: {message}")]
    Corrupt { key: DraftKey, message: String },

    #[error(transparent)]
    Wizard(#[from] WizardError),
}

/// What an autosave did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Content matched the last successful save for the key
    Unchanged,
}

/// Per-key save slot. Holding its lock is what serializes saves for a key.
#[derive(Debug, Default)]
struct KeySlot {
    last_hash: Option<String>,
}

/// Backoff settings for draft loads
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Saves, restores and finalizes drafts.
///
/// Saves for the same key never overlap: each key has a slot whose lock is
/// held for the whole upsert, so a later save waits for the one in flight
/// and then overwrites it. Different keys save independently.
pub struct DraftPersistence {
    store: Arc<dyn DraftStore>,
    slots: Mutex<HashMap<DraftKey, Arc<Mutex<KeySlot>>>>,
    retain_completed: bool,
    load_retry: RetryPolicy,
}

impl DraftPersistence {
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
            retain_completed: false,
            load_retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(store: Arc<dyn DraftStore>, config: &DraftsConfig) -> Self {
        Self::new(store)
            .with_retain_completed(config.retain_completed)
            .with_load_retry(RetryPolicy {
                max_retries: config.load_retries,
                base_delay: Duration::from_millis(config.load_retry_base_ms),
                max_delay: Duration::from_millis(config.load_retry_max_ms),
            })
    }

    /// Keep finalized drafts as `complete` records instead of deleting them
    pub fn with_retain_completed(mut self, retain: bool) -> Self {
        self.retain_completed = retain;
        self
    }

    pub fn with_load_retry(mut self, policy: RetryPolicy) -> Self {
        self.load_retry = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    async fn slot(&self, key: &DraftKey) -> Arc<Mutex<KeySlot>> {
        self.slots
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drop the slot for `key` unless another save or load is holding or
    /// waiting on it. Only the map and `slot` itself may reference it.
    async fn release_slot(&self, key: &DraftKey, slot: Arc<Mutex<KeySlot>>) {
        let mut slots = self.slots.lock().await;
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
    }

    /// Forget the change tracking for `key` once its session is unmounted
    pub async fn release(&self, key: &DraftKey) {
        let slot = self.slots.lock().await.get(key).cloned();
        if let Some(slot) = slot {
            self.release_slot(key, slot).await;
        }
    }

    /// Upsert the current state as a draft
    #[instrument(skip(self, state), fields(key = %key))]
    pub async fn autosave<P: StepPayload>(
        &self,
        key: &DraftKey,
        kind: WizardKind,
        state: &WizardState<P>,
    ) -> Result<SaveOutcome, PersistenceError> {
        let data = serde_json::to_value(&state.step_data).map_err(WizardError::from)?;
        let hash = content_hash(kind, state.current_step, &data);

        let slot = self.slot(key).await;
        let mut slot = slot.lock().await;
        if slot.last_hash.as_deref() == Some(hash.as_str()) {
            return Ok(SaveOutcome::Unchanged);
        }

        let record = DraftRecord {
            key: key.clone(),
            kind,
            current_step: state.current_step,
            data,
            status: DraftStatus::Draft,
            updated_at: Utc::now(),
        };
        self.store.upsert_draft(&record).await?;
        slot.last_hash = Some(hash);
        debug!(store = self.store.name(), step = state.current_step, "draft saved");
        Ok(SaveOutcome::Saved)
    }

    /// Restore the most recent draft for `key`, if any.
    ///
    /// Completed records are not resumed. A step counts as completed when
    /// its stored record has at least one filled-in field.
    #[instrument(skip(self, definition), fields(key = %key))]
    pub async fn load_draft<P: StepPayload>(
        &self,
        key: &DraftKey,
        kind: WizardKind,
        definition: &WizardDefinition<P>,
    ) -> Result<Option<WizardState<P>>, PersistenceError> {
        let fetch = || async { self.store.fetch_draft(key).await };
        let record = fetch
            .retry(self.load_retry.strategy())
            .when(StoreError::is_transient)
            .notify(|err, dur| {
                warn!("Retrying draft load after {:?}: {}", dur, err);
            })
            .await?;

        let Some(record) = record else {
            return Ok(None);
        };
        if record.kind != kind {
            return Err(PersistenceError::KindMismatch {
                key: key.clone(),
                expected: kind,
                found: record.kind,
            });
        }
        if record.status == DraftStatus::Complete {
            info!("draft already submitted, starting fresh");
            return Ok(None);
        }

        let mut step_data: StepData<P> =
            serde_json::from_value(record.data.clone()).map_err(|e| PersistenceError::Corrupt {
                key: key.clone(),
                message: e.to_string(),
            })?;
        step_data.retain(|id, payload| {
            let matches = payload.step_id() == *id;
            if !matches {
                warn!(step = id, "dropping record stored under the wrong step");
            }
            matches
        });

        let completed = definition
            .steps()
            .iter()
            .filter(|s| step_data.get(&s.id).is_some_and(|p| !p.is_blank()))
            .map(|s| s.id)
            .collect();

        self.slot(key).await.lock().await.last_hash =
            Some(content_hash(kind, record.current_step, &record.data));

        Ok(Some(WizardState {
            current_step: record.current_step,
            step_data,
            completed,
        }))
    }

    /// Retire the draft after its wizard was submitted
    #[instrument(skip(self, state), fields(key = %key))]
    pub async fn save_final<P: StepPayload>(
        &self,
        key: &DraftKey,
        kind: WizardKind,
        state: &WizardState<P>,
    ) -> Result<(), PersistenceError> {
        let slot = self.slot(key).await;
        let result = async {
            let mut guard = slot.lock().await;
            if self.retain_completed {
                let record = DraftRecord {
                    key: key.clone(),
                    kind,
                    current_step: state.current_step,
                    data: serde_json::to_value(&state.step_data).map_err(WizardError::from)?,
                    status: DraftStatus::Complete,
                    updated_at: Utc::now(),
                };
                self.store.upsert_draft(&record).await?;
            } else {
                self.store.delete_draft(key).await?;
            }
            guard.last_hash = None;
            Ok::<_, PersistenceError>(())
        }
        .await;
        self.release_slot(key, slot).await;

        result?;
        info!(retained = self.retain_completed, "draft finalized");
        Ok(())
    }

    /// Stored drafts, most recently updated first
    pub async fn list_drafts(&self) -> Result<Vec<DraftRecord>, PersistenceError> {
        let mut drafts = self.store.list_drafts().await?;
        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(drafts)
    }

    pub async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, PersistenceError> {
        Ok(self.store.fetch_draft(key).await?)
    }

    pub async fn delete_draft(&self, key: &DraftKey) -> Result<bool, PersistenceError> {
        let slot = self.slot(key).await;
        let result = async {
            let mut guard = slot.lock().await;
            let existed = self.store.delete_draft(key).await?;
            guard.last_hash = None;
            Ok::<_, PersistenceError>(existed)
        }
        .await;
        self.release_slot(key, slot).await;
        result
    }
}

fn content_hash(kind: WizardKind, step: u32, data: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(step.to_be_bytes());
    hasher.update(data.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests;
