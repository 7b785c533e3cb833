//! Draft records and the stores that hold them.
//!
//! A draft is the autosaved snapshot of a wizard run, keyed by a session or
//! entity identifier. Stores only offer upsert/fetch/delete/list; ordering of
//! saves per key is enforced one level up by [`DraftPersistence`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wizard::StepId;
use crate::wizards::WizardKind;

pub mod autosave;
pub mod file;
pub mod memory;
pub mod persistence;

pub use autosave::AutosaveHandle;
pub use file::FileDraftStore;
pub use memory::MemoryDraftStore;
pub use persistence::{DraftPersistence, PersistenceError, SaveOutcome};

const MAX_KEY_LEN: usize = 128;

/// Session or entity identifier a draft is stored under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DraftKey(String);

impl DraftKey {
    pub fn new(key: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        let valid_chars = key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if key.is_empty() || key.len() > MAX_KEY_LEN || !valid_chars || key.starts_with('.') {
            return Err(StoreError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    /// Fresh random key for a new session
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DraftKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DraftKey {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DraftKey> for String {
    fn from(key: DraftKey) -> Self {
        key.0
    }
}

/// Lifecycle of a stored draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Complete,
}

/// Persisted snapshot of a wizard run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub key: DraftKey,
    pub kind: WizardKind,
    pub current_step: StepId,
    /// Serialized step data map
    pub data: serde_json::Value,
    pub status: DraftStatus,
    pub updated_at: DateTime<Utc>,
}

/// Errors reported by draft stores and submission sinks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid draft key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O failed: {0}")]
    Io(String),

    #[error("failed to (de)serialize record: {0}")]
    Serialization(String),

    #[error("backend rejected credentials")]
    Unauthorized,

    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("backend unreachable: {0}")]
    Network(String),
}

impl StoreError {
    /// Worth retrying: the same call may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) | StoreError::Io(_) => true,
            StoreError::Http { status, .. } => *status == 429 || *status >= 500,
            StoreError::InvalidKey(_) | StoreError::Serialization(_) | StoreError::Unauthorized => {
                false
            }
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Backing store for draft records (upsert semantics, keyed by draft key)
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &str;

    /// Insert or replace the record stored under `record.key`
    async fn upsert_draft(&self, record: &DraftRecord) -> Result<(), StoreError>;

    async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError>;

    /// Remove a draft; returns whether a record existed
    async fn delete_draft(&self, key: &DraftKey) -> Result<bool, StoreError>;

    /// Every stored draft, in no particular order
    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, StoreError>;
}
