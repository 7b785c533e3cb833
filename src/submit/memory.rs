//! In-memory submission sink.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Submission, SubmissionReceipt, SubmissionSink};
use crate::drafts::StoreError;

/// Keeps accepted submissions in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySubmissionSink {
    accepted: RwLock<Vec<(SubmissionReceipt, Submission)>>,
}

impl MemorySubmissionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submissions(&self) -> Vec<(SubmissionReceipt, Submission)> {
        self.accepted.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.accepted.read().await.len()
    }
}

#[async_trait]
impl SubmissionSink for MemorySubmissionSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn finalize_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, StoreError> {
        let receipt = SubmissionReceipt::new(uuid::Uuid::new_v4().to_string());
        self.accepted
            .write()
            .await
            .push((receipt.clone(), submission.clone()));
        Ok(receipt)
    }
}
