//! Site-generation phase.

use super::PhaseContext;
use crate::core::{SiteOutput, TranslatedBlock};
use crate::gateway::{RenderRequest, SiteMeta};
use crate::retry::{CallSpec, OperationClass};
use tracing::{info, warn};

/// Input of the site-generation phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteInput {
    /// Source document reference.
    pub document: String,
    /// Translated blocks to render.
    pub blocks: Vec<TranslatedBlock>,
    /// Output location.
    pub output_dir: String,
    /// Metadata embedded into the site.
    pub meta: SiteMeta,
    /// Idempotency key persisted before the call.
    pub idempotency_key: String,
}

/// Renders the translated manual.
#[derive(Debug)]
pub struct SitePhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> SitePhase<'a> {
    /// Creates the phase.
    #[must_use]
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Runs the phase.
    pub async fn run(&self, input: SiteInput) -> SiteOutput {
        let ctx = self.ctx;
        let request = RenderRequest {
            document: input.document,
            blocks: input.blocks,
            output_dir: input.output_dir,
            meta: input.meta,
            idempotency_key: input.idempotency_key,
        };
        // Rendering is local work; the quick policy applies.
        let spec = CallSpec::new("render", OperationClass::Quick, ctx.config.timeouts.render());

        match ctx
            .executor
            .invoke(&spec, |_hb| ctx.services.renderer.render(&request))
            .await
        {
            Ok(site) => {
                info!(
                    job_id = %ctx.job_id,
                    pages = site.page_count,
                    blocks = site.block_count,
                    html = %site.html_path,
                    "Site generated"
                );
                SiteOutput::succeeded(site.json_path, site.html_path, site.page_count, site.block_count)
            }
            Err(error) => {
                warn!(job_id = %ctx.job_id, error = %error, "Site generation failed");
                SiteOutput::failed(error.message)
            }
        }
    }
}
