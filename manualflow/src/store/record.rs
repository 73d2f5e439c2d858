//! The durable per-job record.

use crate::core::{
    CleanupOutput, JobInput, JobResult, JobStatus, OcrOutput, Phase, ProductInfo,
    ProgressSnapshot, SiteOutput, TranslationOutput,
};
use crate::utils::{generate_idempotency_key, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable state of the product URL suspension.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuspensionState {
    /// When the job started waiting.
    pub suspended_at: Option<Timestamp>,
    /// URL the job resumed with; set once the suspension ends.
    pub resolved_url: Option<String>,
    /// True when the wait ended by timeout.
    pub timed_out: bool,
}

impl SuspensionState {
    /// Returns true while waiting and not yet resolved.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.suspended_at.is_some() && self.resolved_url.is_none()
    }
}

/// Everything needed to resume a job after a restart.
///
/// Each phase checkpoint is written before the next phase starts; a phase
/// with a checkpoint is never invoked again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Resolved job input.
    pub input: JobInput,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Last reported phase.
    pub phase: Phase,
    /// Product lookup checkpoint.
    pub product: Option<ProductInfo>,
    /// OCR checkpoint.
    pub ocr: Option<OcrOutput>,
    /// Product URL suspension.
    #[serde(default)]
    pub suspension: SuspensionState,
    /// Translation checkpoint.
    pub translation: Option<TranslationOutput>,
    /// Site-generation checkpoint.
    pub site: Option<SiteOutput>,
    /// Cleanup checkpoint.
    pub cleanup: Option<CleanupOutput>,
    /// Last published progress.
    pub progress: ProgressSnapshot,
    /// Accumulated warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Idempotency keys issued per phase.
    #[serde(default)]
    pub call_keys: BTreeMap<Phase, String>,
    /// Terminal result.
    pub result: Option<JobResult>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last write time.
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Creates the initial record for a job.
    #[must_use]
    pub fn new(input: JobInput) -> Self {
        let now = Utc::now();
        let progress = ProgressSnapshot::new(input.manual_name.clone());
        Self {
            input,
            status: JobStatus::Running,
            phase: Phase::Initializing,
            product: None,
            ocr: None,
            suspension: SuspensionState::default(),
            translation: None,
            site: None,
            cleanup: None,
            progress,
            warnings: Vec::new(),
            call_keys: BTreeMap::new(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The job id.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.input.job_id
    }

    /// Returns true once the job succeeded or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records a warning once.
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Returns the idempotency key for a phase's calls, issuing it if needed.
    ///
    /// The key must be persisted before the call so a replay reuses it.
    pub fn call_key(&mut self, phase: Phase) -> String {
        let job_id = self.input.job_id.clone();
        self.call_keys
            .entry(phase)
            .or_insert_with(|| generate_idempotency_key(&[&job_id, &phase.to_string()]))
            .clone()
    }

    /// Stamps the record as updated now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
