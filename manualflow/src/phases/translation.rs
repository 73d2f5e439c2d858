//! Translation phase: one batch call over every surviving block.

use super::PhaseContext;
use crate::core::{TextBlock, TranslationOutput};
use crate::gateway::TranslateRequest;
use crate::retry::{CallSpec, OperationClass};
use tracing::{info, warn};

/// Translates OCR blocks.
#[derive(Debug)]
pub struct TranslationPhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> TranslationPhase<'a> {
    /// Creates the phase.
    #[must_use]
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Runs the phase.
    pub async fn run(&self, blocks: &[TextBlock], source_lang: &str, target_lang: &str) -> TranslationOutput {
        let ctx = self.ctx;
        let request = TranslateRequest {
            blocks: blocks.to_vec(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        };
        let spec = CallSpec::new(
            "translate",
            OperationClass::RemoteApi,
            ctx.config.timeouts.translation(),
        );

        match ctx
            .executor
            .invoke(&spec, |_hb| ctx.services.translation.translate(&request))
            .await
        {
            Ok(translated) if translated.is_empty() && !blocks.is_empty() => {
                warn!(job_id = %ctx.job_id, "Translation returned no blocks");
                TranslationOutput::failed("translation service returned no blocks")
            }
            Ok(translated) => {
                info!(job_id = %ctx.job_id, blocks = translated.len(), "Translation complete");
                TranslationOutput::succeeded(translated)
            }
            Err(error) => {
                warn!(job_id = %ctx.job_id, error = %error, "Translation failed");
                TranslationOutput::failed(error.message)
            }
        }
    }
}
