//! OCR phase: page count, then the per-page fan-out.

use super::pages::PageProcessor;
use super::PhaseContext;
use crate::core::OcrOutput;
use crate::retry::{CallSpec, OperationClass};
use tracing::{info, warn};

/// Error reported when no page produced any text.
pub const NO_TEXT_BLOCKS: &str = "No text blocks found";

/// Extracts text blocks from every page of a document.
#[derive(Debug)]
pub struct OcrPhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> OcrPhase<'a> {
    /// Creates the phase.
    #[must_use]
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Runs the phase.
    ///
    /// Succeeds when at least one block survives; failed pages are listed in
    /// the output but do not fail the phase.
    pub async fn run(&self, document: &str) -> OcrOutput {
        let ctx = self.ctx;
        let spec = CallSpec::new(
            "page_count",
            OperationClass::Quick,
            ctx.config.timeouts.page_count(),
        );
        let page_count = match ctx
            .executor
            .invoke(&spec, |_hb| ctx.services.ocr.page_count(document))
            .await
        {
            Ok(count) => count,
            Err(error) => {
                warn!(job_id = %ctx.job_id, error = %error, "Page count failed");
                return OcrOutput::failed(error.message);
            }
        };

        let aggregate = PageProcessor::new(ctx)
            .process_pages(document, page_count)
            .await;

        if aggregate.blocks.is_empty() {
            if let Some(reason) = ctx.executor.cancel_token().reason() {
                return OcrOutput::failed(reason);
            }
            return OcrOutput::failed(NO_TEXT_BLOCKS);
        }

        let failed_pages = aggregate.failed_page_indices();
        info!(
            job_id = %ctx.job_id,
            pages = page_count,
            blocks = aggregate.blocks.len(),
            failed_pages = failed_pages.len(),
            "OCR complete"
        );
        OcrOutput::succeeded(aggregate.blocks, page_count, failed_pages)
    }
}
