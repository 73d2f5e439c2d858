//! File-backed job store.
//!
//! One pretty-printed JSON document per job, named `<job_id>.json`. Writes go
//! to a temporary file in the same directory which is synced and then
//! renamed over the target, so a crash leaves either the old or the new
//! record, never a torn one.

use super::{check_writable, JobRecord, JobStore};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Stores job records as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    /// Opens a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !job_id.is_empty()
            && !job_id.starts_with('.')
            && !job_id.contains("..")
            && !job_id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StoreError::InvalidKey(job_id.to_string()));
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    fn read_record(path: &Path) -> Result<Option<JobRecord>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_record(dir: &Path, path: &Path, record: &JobRecord) -> Result<(), StoreError> {
        let existing = Self::read_record(path)?;
        check_writable(existing.as_ref(), record.job_id())?;

        let json = serde_json::to_string_pretty(record)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_all(dir: &Path) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable job record"),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

async fn blocking<T, F>(work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.path_for(record.job_id())?;
        let dir = self.dir.clone();
        let record = record.clone();
        blocking(move || Self::write_record(&dir, &path, &record)).await
    }

    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let path = self.path_for(job_id)?;
        blocking(move || Self::read_record(&path)).await
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let dir = self.dir.clone();
        blocking(move || Self::read_all(&dir)).await
    }
}
