//! Job request, resolved input, terminal result and progress snapshot.

use super::phase::{JobStatus, Phase};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::utils::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A caller's request to translate one manual.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Reference to the source document.
    pub document: String,
    /// Manual name; also seeds the job id and product lookup.
    pub manual_name: String,
    /// Output location; defaults to `<output_root>/<manual_name>`.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Source language; defaults to the configured one.
    #[serde(default)]
    pub source_lang: Option<String>,
    /// Target language; defaults to the configured one.
    #[serde(default)]
    pub target_lang: Option<String>,
    /// Skip the cleanup phase entirely.
    #[serde(default)]
    pub skip_cleanup: bool,
}

impl JobRequest {
    /// Creates a request with default languages and output location.
    #[must_use]
    pub fn new(document: impl Into<String>, manual_name: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            manual_name: manual_name.into(),
            ..Self::default()
        }
    }

    /// Sets the output location.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Sets the source and target languages.
    #[must_use]
    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_lang = Some(source.into());
        self.target_lang = Some(target.into());
        self
    }

    /// Sets the skip-cleanup flag.
    #[must_use]
    pub fn with_skip_cleanup(mut self, skip: bool) -> Self {
        self.skip_cleanup = skip;
        self
    }

    /// Rejects requests without a document or manual name.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.document.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "document reference is empty".to_string(),
            ));
        }
        if self.manual_name.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "manual name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A request with every default resolved, bound to a job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    /// Unique job id.
    pub job_id: String,
    /// Reference to the source document.
    pub document: String,
    /// Manual name.
    pub manual_name: String,
    /// Output location.
    pub output_dir: String,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Skip the cleanup phase.
    pub skip_cleanup: bool,
}

impl JobInput {
    /// Resolves a request against the configuration.
    #[must_use]
    pub fn resolve(job_id: impl Into<String>, request: JobRequest, config: &PipelineConfig) -> Self {
        let output_dir = request
            .output_dir
            .unwrap_or_else(|| config.default_output_dir(&request.manual_name));
        Self {
            job_id: job_id.into(),
            document: request.document,
            manual_name: request.manual_name,
            output_dir,
            source_lang: request
                .source_lang
                .unwrap_or_else(|| config.default_source_lang.clone()),
            target_lang: request
                .target_lang
                .unwrap_or_else(|| config.default_target_lang.clone()),
            skip_cleanup: request.skip_cleanup,
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobResult {
    /// Job id.
    pub job_id: String,
    /// Source document reference.
    pub input_path: String,
    /// Output location; empty on failure.
    pub output_dir: String,
    /// Rendered JSON path; empty on failure.
    pub json_path: String,
    /// Rendered HTML path; empty on failure.
    pub html_path: String,
    /// Pages in the document.
    pub pages: usize,
    /// Blocks extracted by OCR.
    pub ocr_blocks: usize,
    /// Blocks translated.
    pub translated_blocks: usize,
    /// Resolved product URL.
    pub product_url: String,
    /// Product name, preferring the cleanup correction.
    pub product_name: String,
    /// Tags suggested during cleanup.
    pub tags: Vec<String>,
    /// Non-fatal problems operators may want to act on.
    pub warnings: Vec<String>,
    /// Whether the job completed.
    pub success: bool,
    /// `"<Phase> failed: <cause>"` when the job failed.
    pub error: Option<String>,
    /// Phase at which the job failed.
    pub failed_phase: Option<Phase>,
}

impl JobResult {
    /// Creates a failed result with empty output paths.
    #[must_use]
    pub fn failure(input: &JobInput, phase: Phase, cause: &str) -> Self {
        Self {
            job_id: input.job_id.clone(),
            input_path: input.document.clone(),
            success: false,
            error: Some(phase.failure_message(cause)),
            failed_phase: Some(phase),
            ..Self::default()
        }
    }
}

/// Point-in-time view of a job, safe to read while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Job lifecycle status.
    pub status: JobStatus,
    /// OCR status line.
    pub ocr_status: String,
    /// Translation status line.
    pub translation_status: String,
    /// Site-generation status line.
    pub site_status: String,
    /// Cleanup status line.
    pub cleanup_status: String,
    /// Pages discovered.
    pub pages_total: usize,
    /// Blocks discovered.
    pub blocks_total: usize,
    /// Resolved product URL.
    pub product_url: String,
    /// Product name.
    pub product_name: String,
    /// Manual name.
    pub manual_name: String,
    /// True while the job waits for a product URL.
    pub waiting_for_input: bool,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl ProgressSnapshot {
    /// Creates the initial snapshot for a manual.
    #[must_use]
    pub fn new(manual_name: impl Into<String>) -> Self {
        Self {
            phase: Phase::Initializing,
            status: JobStatus::Running,
            ocr_status: String::new(),
            translation_status: String::new(),
            site_status: String::new(),
            cleanup_status: String::new(),
            pages_total: 0,
            blocks_total: 0,
            product_url: String::new(),
            product_name: String::new(),
            manual_name: manual_name.into(),
            waiting_for_input: false,
            updated_at: Utc::now(),
        }
    }
}
