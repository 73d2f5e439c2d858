//! Phase modules.
//!
//! Each phase wraps one or more gateway calls behind a single typed
//! input/output contract. Phases never inspect each other's internals; the
//! orchestrator passes one phase's output record verbatim to the next.

mod cleanup;
mod ocr;
mod pages;
mod site;
mod translation;

pub use cleanup::{CleanupPhase, NO_LLM_WARNING};
pub use ocr::{OcrPhase, NO_TEXT_BLOCKS};
pub use pages::{PageAggregate, PageProcessor};
pub use site::{SiteInput, SitePhase};
pub use translation::TranslationPhase;

use crate::config::PipelineConfig;
use crate::gateway::Services;
use crate::retry::RetryExecutor;
use std::sync::Arc;

/// Everything a phase needs to issue its calls for one job.
#[derive(Clone, Debug)]
pub struct PhaseContext {
    /// Owning job.
    pub job_id: String,
    /// Collaborator handles for this job.
    pub services: Services,
    /// Retry executor bound to the job's cancellation token.
    pub executor: RetryExecutor,
    /// Configuration snapshot taken at job start.
    pub config: Arc<PipelineConfig>,
}

impl PhaseContext {
    /// Creates a phase context.
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        services: Services,
        executor: RetryExecutor,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            services,
            executor,
            config,
        }
    }
}

#[cfg(test)]
mod phase_tests;
