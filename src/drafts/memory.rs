use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DraftKey, DraftRecord, DraftStore, StoreError};

/// Process-local draft store, used for tests and ephemeral servers
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    records: RwLock<HashMap<DraftKey, DraftRecord>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_draft(&self, record: &DraftRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn delete_draft(&self, key: &DraftKey) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
