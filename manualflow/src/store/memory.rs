//! In-memory job store.

use super::{check_writable, JobRecord, JobStore};
use crate::errors::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps job records in process memory.
///
/// Records survive as long as the store value; useful for tests and for
/// embedding where restarts are not a concern.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        check_writable(records.get(record.job_id()), record.job_id())?;
        records.insert(record.job_id().to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().get(job_id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut records: Vec<JobRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}
