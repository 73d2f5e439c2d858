//! Pipeline phase and job status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline phase, in execution order.
///
/// The derived ordering follows declaration order, which is the only order a
/// job may move through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Job created; product lookup in progress.
    Initializing,
    /// Text extraction over every page.
    Ocr,
    /// Batch translation of the extracted blocks.
    Translation,
    /// Rendering the translated manual.
    SiteGeneration,
    /// Normalization, noise removal and LLM correction.
    Cleanup,
    /// Terminal success.
    Complete,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Initializing
    }
}

impl Phase {
    /// Every phase, in order.
    pub const ALL: [Phase; 6] = [
        Phase::Initializing,
        Phase::Ocr,
        Phase::Translation,
        Phase::SiteGeneration,
        Phase::Cleanup,
        Phase::Complete,
    ];

    /// Human-readable label used as the prefix of phase error strings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Initializing => "Initialization",
            Self::Ocr => "OCR",
            Self::Translation => "Translation",
            Self::SiteGeneration => "Site generation",
            Self::Cleanup => "Cleanup",
            Self::Complete => "Completion",
        }
    }

    /// Formats a phase failure as `"<Phase> failed: <cause>"`.
    #[must_use]
    pub fn failure_message(self, cause: &str) -> String {
        format!("{} failed: {cause}", self.label())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Ocr => write!(f, "ocr"),
            Self::Translation => write!(f, "translation"),
            Self::SiteGeneration => write!(f, "site_generation"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The orchestrator is driving phases.
    Running,
    /// Suspended until a product URL arrives or the wait times out.
    AwaitingInput,
    /// Terminal success.
    Succeeded,
    /// Terminal failure.
    Failed,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl JobStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingInput => write!(f, "awaiting_input"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
