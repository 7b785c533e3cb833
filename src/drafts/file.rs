//! Draft store keeping one JSON file per draft key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{DraftKey, DraftRecord, DraftStore, StoreError};

/// Stores drafts as `<dir>/<key>.json`.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// reader never observes a partially written record.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &DraftKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::Io(format!("invalid record path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl DraftStore for FileDraftStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert_draft(&self, record: &DraftRecord) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(&record.key), &contents).await
    }

    async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
        match fs::read(self.record_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_draft(&self, key: &DraftKey) -> Result<bool, StoreError> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            let parsed = fs::read(&path)
                .await
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice::<DraftRecord>(&bytes).map_err(Into::into));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable draft"),
            }
        }
        Ok(records)
    }
}
