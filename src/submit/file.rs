//! Submission sink writing each accepted record to a JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use super::{Submission, SubmissionReceipt, SubmissionSink};
use crate::drafts::file::write_atomic;
use crate::drafts::StoreError;

/// Writes `<dir>/<kind>/<receipt id>.json`
#[derive(Debug, Clone)]
pub struct FileSubmissionSink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct StoredSubmission<'a> {
    receipt: &'a SubmissionReceipt,
    #[serde(flatten)]
    submission: &'a Submission,
}

impl FileSubmissionSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SubmissionSink for FileSubmissionSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn finalize_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, StoreError> {
        let receipt = SubmissionReceipt::new(uuid::Uuid::new_v4().to_string());
        let path = self
            .dir
            .join(submission.kind.as_str())
            .join(format!("{}.json", receipt.id));
        let contents = serde_json::to_vec_pretty(&StoredSubmission {
            receipt: &receipt,
            submission,
        })?;
        write_atomic(&path, &contents).await?;
        tracing::info!(
            key = %submission.key,
            kind = %submission.kind,
            receipt = %receipt.id,
            path = %path.display(),
            "submission stored"
        );
        Ok(receipt)
    }
}
