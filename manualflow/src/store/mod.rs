//! Durable job state.
//!
//! A [`JobStore`] keeps one [`JobRecord`] per job id. Records are written by
//! the orchestrator after every step and become immutable once terminal.

mod file;
mod memory;
mod record;

pub use file::FileJobStore;
pub use memory::InMemoryJobStore;
pub use record::{JobRecord, SuspensionState};

use crate::errors::StoreError;
use async_trait::async_trait;

/// Persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Writes a record, replacing any earlier version.
    ///
    /// Fails with [`StoreError::Immutable`] if the stored version is terminal.
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Loads a record by job id.
    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Lists every record, oldest first.
    async fn list(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Lists records that have not reached a terminal status.
    async fn list_unfinished(&self) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_terminal())
            .collect())
    }
}

fn check_writable(existing: Option<&JobRecord>, job_id: &str) -> Result<(), StoreError> {
    match existing {
        Some(record) if record.is_terminal() => Err(StoreError::Immutable(job_id.to_string())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::{JobInput, JobRequest, JobStatus, Phase};

    fn record(job_id: &str) -> JobRecord {
        JobRecord::new(JobInput::resolve(
            job_id,
            JobRequest::new("a.pdf", "TR-808"),
            &PipelineConfig::default(),
        ))
    }

    async fn exercise(store: &dyn JobStore) {
        let mut first = record("job-1");
        store.save(&first).await.unwrap();
        store.save(&record("job-2")).await.unwrap();

        first.phase = Phase::Translation;
        store.save(&first).await.unwrap();
        let loaded = store.load("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.phase, Phase::Translation);
        assert!(store.load("missing").await.unwrap().is_none());

        first.status = JobStatus::Succeeded;
        store.save(&first).await.unwrap();
        assert!(matches!(
            store.save(&first).await,
            Err(StoreError::Immutable(_))
        ));

        let unfinished = store.list_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].job_id(), "job-2");
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryJobStore::new();
        exercise(&store).await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path().join("jobs")).unwrap();
        exercise(&store).await;
        assert!(store.dir().join("job-1.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut saved = record("job-1");
        saved.warn("lookup failed");
        FileJobStore::open(dir.path()).unwrap().save(&saved).await.unwrap();

        let reopened = FileJobStore::open(dir.path()).unwrap();
        let loaded = reopened.load("job-1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_file_store_rejects_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).unwrap();
        for id in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.load(id).await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_file_store_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        let store = FileJobStore::open(dir.path()).unwrap();
        store.save(&record("job-1")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
