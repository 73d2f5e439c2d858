//! Cleanup phase: normalization, noise removal, then LLM correction.
//!
//! No sub-stage failure ever fails the job. A failed sub-stage contributes
//! zero to its counter and a warning to the output.

use super::PhaseContext;
use crate::core::CleanupOutput;
use crate::errors::ServiceError;
use crate::gateway::CleanupRequest;
use crate::retry::{CallSpec, OperationClass};
use serde_json::json;
use tracing::{info, warn};

/// Warning recorded when LLM correction is disabled.
pub const NO_LLM_WARNING: &str = "LLM correction skipped";

/// Improves the rendered translation in three sub-stages.
#[derive(Debug)]
pub struct CleanupPhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> CleanupPhase<'a> {
    /// Creates the phase.
    #[must_use]
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Runs the three sub-stages in order.
    pub async fn run(&self, request: &CleanupRequest) -> CleanupOutput {
        let ctx = self.ctx;
        let timeouts = &ctx.config.timeouts;
        let cleanup = &ctx.services.cleanup;
        let mut output = CleanupOutput::default();

        let normalize = stage_request(request, "normalize");
        let spec = CallSpec::new("normalize_text", OperationClass::Quick, timeouts.normalize());
        match ctx
            .executor
            .invoke(&spec, |_hb| cleanup.normalize_text(&normalize))
            .await
        {
            Ok(fixes) => output.normalization_fixes = fixes,
            Err(error) => self.stage_failed(&mut output, "Encoding normalization", &error),
        }

        let noise = stage_request(request, "noise");
        let spec = CallSpec::new("remove_noise", OperationClass::Quick, timeouts.noise_removal());
        match ctx
            .executor
            .invoke(&spec, |_hb| cleanup.remove_noise(&noise))
            .await
        {
            Ok(removals) => output.noise_removals = removals,
            Err(error) => self.stage_failed(&mut output, "Noise removal", &error),
        }

        if ctx.config.skip_llm_correction {
            output.warnings.push(NO_LLM_WARNING.to_string());
        } else {
            let correct = stage_request(request, "llm");
            let spec = CallSpec::new("llm_correct", OperationClass::Llm, timeouts.llm())
                .with_heartbeat_timeout(timeouts.llm_heartbeat());
            match ctx
                .executor
                .invoke(&spec, |hb| cleanup.correct(&correct, hb))
                .await
            {
                Ok(correction) => {
                    output.llm_corrections = correction.corrections;
                    output.corrected_product_name = correction
                        .corrected_name
                        .filter(|name| !name.trim().is_empty());
                    output.tags = correction.tags;
                }
                Err(error) => {
                    output.error = Some(error.message.clone());
                    self.stage_failed(&mut output, "LLM correction", &error);
                }
            }
        }

        info!(
            job_id = %ctx.job_id,
            normalization_fixes = output.normalization_fixes,
            noise_removals = output.noise_removals,
            llm_corrections = output.llm_corrections,
            warnings = output.warnings.len(),
            "Cleanup complete"
        );
        output
    }

    fn stage_failed(&self, output: &mut CleanupOutput, stage: &str, error: &ServiceError) {
        warn!(job_id = %self.ctx.job_id, stage, error = %error, "Cleanup stage failed");
        self.ctx.executor.events().try_emit(
            "cleanup.stage_failed",
            Some(json!({
                "job_id": self.ctx.job_id,
                "stage": stage,
                "error": error,
            })),
        );
        output.warnings.push(format!("{stage} failed: {}", error.message));
    }
}

fn stage_request(request: &CleanupRequest, stage: &str) -> CleanupRequest {
    CleanupRequest {
        idempotency_key: format!("{}:{stage}", request.idempotency_key),
        ..request.clone()
    }
}
