//! The pipeline orchestrator state machine.
//!
//! Drives one job through `ocr → translation → site_generation → cleanup`,
//! checkpointing every phase output to the job store before the next phase
//! starts. A restarted job skips every phase that already has a checkpoint.

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    CleanupOutput, JobResult, JobStatus, OcrOutput, Phase, ProductInfo, ProgressSnapshot,
    SiteOutput, TranslationOutput,
};
use crate::errors::StoreError;
use crate::events::EventSink;
use crate::gateway::{CleanupRequest, ServiceFactory, SiteMeta};
use crate::observability::{job_span, PhaseTimer};
use crate::phases::{CleanupPhase, OcrPhase, PhaseContext, SiteInput, SitePhase, TranslationPhase};
use crate::progress::ProgressTracker;
use crate::retry::{CallSpec, OperationClass, RetryExecutor};
use crate::store::{JobRecord, JobStore};
use crate::suspension::{SuspensionOutcome, UrlSignal};
use crate::utils::elapsed_ms;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

const WAITING_FOR_URL: &str = "Complete - Waiting for product URL...";

/// Dependencies shared by every job a service runs.
#[derive(Clone)]
pub struct JobRuntime {
    /// Configuration snapshot.
    pub config: Arc<PipelineConfig>,
    /// Durable job state.
    pub store: Arc<dyn JobStore>,
    /// Builds collaborator handles at job start.
    pub factory: Arc<dyn ServiceFactory>,
    /// Lifecycle event sink.
    pub events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for JobRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRuntime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handles through which observers and operators reach a running job.
#[derive(Debug, Clone)]
pub struct JobHandles {
    /// Progress published by the orchestrator.
    pub progress: Arc<ProgressTracker>,
    /// Product URL signal.
    pub signal: Arc<UrlSignal>,
    /// Job-scoped cancellation.
    pub cancel: Arc<CancellationToken>,
}

impl JobHandles {
    /// Creates handles for a record, restoring its last published progress.
    #[must_use]
    pub fn for_record(record: &JobRecord) -> Self {
        Self {
            progress: Arc::new(ProgressTracker::from_snapshot(record.progress.clone())),
            signal: Arc::new(UrlSignal::new(record.job_id())),
            cancel: Arc::new(CancellationToken::new()),
        }
    }
}

/// Why a job stopped before completing.
#[derive(Debug)]
enum Abort {
    Phase { phase: Phase, cause: String },
    Cancelled(String),
    Store(StoreError),
}

/// Runs one job to a terminal [`JobResult`].
pub struct PipelineOrchestrator {
    record: JobRecord,
    runtime: JobRuntime,
    handles: JobHandles,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator for a new or resumed record.
    #[must_use]
    pub fn new(record: JobRecord, runtime: JobRuntime, handles: JobHandles) -> Self {
        Self {
            record,
            runtime,
            handles,
        }
    }

    /// Runs the job to completion or failure.
    ///
    /// Never returns an error: every failure is folded into the result,
    /// which is also persisted as the record's terminal state.
    pub async fn run(self) -> JobResult {
        let span = job_span(self.record.job_id(), &self.record.input.manual_name);
        self.execute().instrument(span).await
    }

    async fn execute(mut self) -> JobResult {
        let resumed = self.record.product.is_some() || self.record.phase > Phase::Initializing;
        if resumed {
            info!(phase = %self.record.phase, "Resuming job from checkpoint");
            self.emit(
                "job.resumed_from_checkpoint",
                json!({ "job_id": self.record.job_id(), "phase": self.record.phase }),
            );
        } else {
            info!(document = %self.record.input.document, "Starting job");
            self.emit(
                "job.started",
                json!({
                    "job_id": self.record.job_id(),
                    "manual_name": self.record.input.manual_name,
                    "document": self.record.input.document,
                }),
            );
        }

        let config = self.runtime.config.clone();
        let outcome = match self.runtime.factory.connect(&config.services).await {
            Ok(services) => {
                let executor = RetryExecutor::new(
                    self.record.job_id(),
                    config.retry.clone(),
                    self.runtime.events.clone(),
                    self.handles.cancel.clone(),
                );
                let ctx = PhaseContext::new(self.record.job_id(), services, executor, config);
                self.drive(&ctx).await
            }
            Err(error) => Err(Abort::Phase {
                phase: self.record.phase,
                cause: format!("service connection failed: {}", error.message),
            }),
        };
        self.finish(outcome).await
    }

    async fn drive(&mut self, ctx: &PhaseContext) -> Result<JobResult, Abort> {
        let product = self.lookup_product(ctx).await?;
        let ocr = self.run_ocr(ctx).await?;
        let product = self.resolve_product_url(product).await?;
        let translation = self.run_translation(ctx, &ocr).await?;
        let site = self.run_site(ctx, &product, &translation).await?;
        let cleanup = self.run_cleanup(ctx, &product, &site).await?;
        Ok(self.success_result(&product, &ocr, &translation, &site, &cleanup))
    }

    async fn lookup_product(&mut self, ctx: &PhaseContext) -> Result<ProductInfo, Abort> {
        if let Some(product) = &self.record.product {
            return Ok(product.clone());
        }
        self.check_cancelled()?;

        let name = self.record.input.manual_name.clone();
        let spec = CallSpec::new(
            "product_lookup",
            OperationClass::RemoteApi,
            ctx.config.timeouts.lookup(),
        );
        let product = match ctx
            .executor
            .invoke(&spec, |_hb| ctx.services.lookup.lookup(&name))
            .await
        {
            Ok(found) => found.into_product(),
            Err(error) if error.is_cancelled() => return Err(self.cancelled()),
            Err(error) => {
                warn!(error = %error, "Product lookup failed");
                self.emit(
                    "lookup.failed",
                    json!({ "job_id": self.record.job_id(), "error": error }),
                );
                self.record
                    .warn(format!("Product lookup failed: {}", error.message));
                ProductInfo::default()
            }
        };

        self.handles.progress.update(|s| {
            s.product_url = product.url.clone();
            s.product_name = product.name.clone();
        });
        self.record.product = Some(product.clone());
        self.checkpoint().await?;
        Ok(product)
    }

    async fn run_ocr(&mut self, ctx: &PhaseContext) -> Result<OcrOutput, Abort> {
        if let Some(ocr) = &self.record.ocr {
            return Ok(ocr.clone());
        }
        let timer = self
            .enter(Phase::Ocr, |s| s.ocr_status = "Starting OCR...".to_string())
            .await?;

        let output = OcrPhase::new(ctx).run(&self.record.input.document).await;
        self.check_cancelled()?;
        if !output.success {
            return Err(Abort::Phase {
                phase: Phase::Ocr,
                cause: output.error.unwrap_or_default(),
            });
        }

        for page in &output.failed_pages {
            self.record.warn(format!("OCR failed for page {page}"));
        }
        self.handles.progress.update(|s| {
            s.pages_total = output.page_count;
            s.blocks_total = output.blocks.len();
            s.ocr_status = output.status_line();
        });
        self.record.ocr = Some(output.clone());
        self.complete_phase(timer).await?;
        Ok(output)
    }

    /// Suspends for operator input when lookup found no product URL.
    async fn resolve_product_url(&mut self, product: ProductInfo) -> Result<ProductInfo, Abort> {
        if product.is_resolved() {
            self.handles.signal.close();
            return Ok(product);
        }
        if let Some(url) = &self.record.suspension.resolved_url {
            self.handles.signal.close();
            return Ok(ProductInfo {
                url: url.clone(),
                ..product
            });
        }
        self.check_cancelled()?;
        if self.record.suspension.is_pending() {
            info!("Resuming interrupted product URL wait");
        }

        let now = Utc::now();
        let suspended_at = *self.record.suspension.suspended_at.get_or_insert(now);
        let timeout = self.runtime.config.suspension_timeout();
        let remaining = timeout.saturating_sub(Duration::from_millis(elapsed_ms(&suspended_at, &now)));

        self.record.status = JobStatus::AwaitingInput;
        self.handles.progress.update(|s| {
            s.status = JobStatus::AwaitingInput;
            s.waiting_for_input = true;
            s.ocr_status = WAITING_FOR_URL.to_string();
        });
        self.checkpoint().await?;

        let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
        info!(remaining_ms, "Product URL not found, waiting for operator input");
        self.emit(
            "job.suspended",
            json!({ "job_id": self.record.job_id(), "timeout_ms": remaining_ms }),
        );

        let outcome = self
            .handles
            .signal
            .wait(remaining, &self.handles.cancel)
            .await;
        match &outcome {
            SuspensionOutcome::Cancelled => return Err(self.cancelled()),
            SuspensionOutcome::TimedOut => {
                warn!("No product URL received; continuing without one");
                self.record.suspension.timed_out = true;
                self.record.warn(format!(
                    "No product URL received within {}; continued without one",
                    describe_wait(timeout)
                ));
            }
            SuspensionOutcome::Signalled(_) => {}
        }
        let url = outcome.resolved_url().trim().to_string();

        let ocr_line = self
            .record
            .ocr
            .as_ref()
            .map(OcrOutput::status_line)
            .unwrap_or_default();
        self.record.suspension.resolved_url = Some(url.clone());
        self.record.status = JobStatus::Running;
        let product = ProductInfo {
            url: url.clone(),
            ..product
        };
        self.record.product = Some(product.clone());
        self.handles.progress.update(|s| {
            s.status = JobStatus::Running;
            s.waiting_for_input = false;
            s.product_url = url.clone();
            s.ocr_status = ocr_line;
        });
        self.checkpoint().await?;

        info!(product_url = %url, "Continuing with product URL");
        self.emit(
            "job.resumed",
            json!({
                "job_id": self.record.job_id(),
                "product_url": url,
                "timed_out": self.record.suspension.timed_out,
            }),
        );
        Ok(product)
    }

    async fn run_translation(
        &mut self,
        ctx: &PhaseContext,
        ocr: &OcrOutput,
    ) -> Result<TranslationOutput, Abort> {
        if let Some(translation) = &self.record.translation {
            return Ok(translation.clone());
        }
        let block_count = ocr.blocks.len();
        let timer = self
            .enter(Phase::Translation, |s| {
                s.translation_status = format!("Translating {block_count} blocks...");
            })
            .await?;

        let input = &self.record.input;
        let output = TranslationPhase::new(ctx)
            .run(&ocr.blocks, &input.source_lang, &input.target_lang)
            .await;
        self.check_cancelled()?;
        if !output.success {
            return Err(Abort::Phase {
                phase: Phase::Translation,
                cause: output.error.unwrap_or_default(),
            });
        }

        self.handles
            .progress
            .update(|s| s.translation_status = output.status_line());
        self.record.translation = Some(output.clone());
        self.complete_phase(timer).await?;
        Ok(output)
    }

    async fn run_site(
        &mut self,
        ctx: &PhaseContext,
        product: &ProductInfo,
        translation: &TranslationOutput,
    ) -> Result<SiteOutput, Abort> {
        if let Some(site) = &self.record.site {
            return Ok(site.clone());
        }
        let idempotency_key = self.record.call_key(Phase::SiteGeneration);
        let timer = self
            .enter(Phase::SiteGeneration, |s| {
                s.site_status = "Generating web viewer...".to_string();
            })
            .await?;

        let input = &self.record.input;
        let site_input = SiteInput {
            document: input.document.clone(),
            blocks: translation.blocks.clone(),
            output_dir: input.output_dir.clone(),
            meta: SiteMeta {
                manual_name: input.manual_name.clone(),
                source_lang: input.source_lang.clone(),
                target_lang: input.target_lang.clone(),
                product_url: product.url.clone(),
                related_links: product.related_links.clone(),
            },
            idempotency_key,
        };
        let output = SitePhase::new(ctx).run(site_input).await;
        self.check_cancelled()?;
        if !output.success {
            return Err(Abort::Phase {
                phase: Phase::SiteGeneration,
                cause: output.error.unwrap_or_default(),
            });
        }

        self.handles.progress.update(|s| {
            s.site_status = output.status_line();
            s.blocks_total = output.block_count;
        });
        self.record.site = Some(output.clone());
        self.complete_phase(timer).await?;
        Ok(output)
    }

    async fn run_cleanup(
        &mut self,
        ctx: &PhaseContext,
        product: &ProductInfo,
        site: &SiteOutput,
    ) -> Result<CleanupOutput, Abort> {
        if let Some(cleanup) = &self.record.cleanup {
            return Ok(cleanup.clone());
        }
        if self.record.input.skip_cleanup {
            let output = CleanupOutput::skipped();
            info!("Cleanup skipped");
            self.handles
                .progress
                .update(|s| s.cleanup_status = output.status_line());
            self.record.cleanup = Some(output.clone());
            self.checkpoint().await?;
            return Ok(output);
        }

        let idempotency_key = self.record.call_key(Phase::Cleanup);
        let timer = self
            .enter(Phase::Cleanup, |s| {
                s.cleanup_status = "Running 3-stage cleanup...".to_string();
            })
            .await?;

        let request = CleanupRequest {
            json_path: site.json_path.clone(),
            product_name: product.name.clone(),
            product_description: product.description.clone(),
            idempotency_key,
        };
        let output = CleanupPhase::new(ctx).run(&request).await;
        self.check_cancelled()?;

        for warning in &output.warnings {
            self.record.warn(warning.clone());
        }
        self.handles
            .progress
            .update(|s| s.cleanup_status = output.status_line());
        self.record.cleanup = Some(output.clone());
        self.complete_phase(timer).await?;
        Ok(output)
    }

    fn success_result(
        &self,
        product: &ProductInfo,
        ocr: &OcrOutput,
        translation: &TranslationOutput,
        site: &SiteOutput,
        cleanup: &CleanupOutput,
    ) -> JobResult {
        let input = &self.record.input;
        JobResult {
            job_id: input.job_id.clone(),
            input_path: input.document.clone(),
            output_dir: input.output_dir.clone(),
            json_path: site.json_path.clone(),
            html_path: site.html_path.clone(),
            pages: ocr.page_count,
            ocr_blocks: ocr.blocks.len(),
            translated_blocks: translation.blocks.len(),
            product_url: product.url.clone(),
            product_name: cleanup
                .corrected_product_name
                .clone()
                .unwrap_or_else(|| product.name.clone()),
            tags: cleanup.tags.clone(),
            warnings: self.record.warnings.clone(),
            success: true,
            error: None,
            failed_phase: None,
        }
    }

    fn failure_result(&self, phase: Phase, cause: &str) -> JobResult {
        let record = &self.record;
        let mut result = JobResult::failure(&record.input, phase, cause);
        if let Some(ocr) = &record.ocr {
            result.pages = ocr.page_count;
            result.ocr_blocks = ocr.blocks.len();
        }
        if let Some(translation) = &record.translation {
            result.translated_blocks = translation.blocks.len();
        }
        if let Some(product) = &record.product {
            result.product_url = product.url.clone();
            result.product_name = product.name.clone();
        }
        result.warnings = record.warnings.clone();
        result
    }

    async fn finish(mut self, outcome: Result<JobResult, Abort>) -> JobResult {
        let result = match outcome {
            Ok(result) => {
                self.record.status = JobStatus::Succeeded;
                self.record.phase = Phase::Complete;
                self.handles.progress.update(|s| {
                    s.phase = Phase::Complete;
                    s.status = JobStatus::Succeeded;
                });
                info!(
                    output_dir = %result.output_dir,
                    warnings = result.warnings.len(),
                    "Job complete"
                );
                self.emit(
                    "job.completed",
                    json!({
                        "job_id": self.record.job_id(),
                        "output_dir": result.output_dir,
                        "warnings": result.warnings,
                    }),
                );
                result
            }
            Err(abort) => {
                let (phase, cause) = match abort {
                    Abort::Phase { phase, cause } => {
                        self.emit(
                            "phase.failed",
                            json!({ "job_id": self.record.job_id(), "phase": phase, "error": cause }),
                        );
                        (phase, cause)
                    }
                    Abort::Cancelled(reason) => (self.record.phase, format!("cancelled: {reason}")),
                    Abort::Store(e) => (self.record.phase, format!("job store error: {e}")),
                };
                let result = self.failure_result(phase, &cause);
                error!(phase = %phase, error = %cause, "Job failed");
                self.record.status = JobStatus::Failed;
                self.handles
                    .progress
                    .update(|s| s.status = JobStatus::Failed);
                self.emit(
                    "job.failed",
                    json!({
                        "job_id": self.record.job_id(),
                        "phase": phase,
                        "error": result.error,
                    }),
                );
                result
            }
        };

        self.handles.signal.close();
        self.record.result = Some(result.clone());
        self.record.progress = self.handles.progress.snapshot();
        self.record.touch();
        if let Err(e) = self.runtime.store.save(&self.record).await {
            error!(error = %e, "Failed to persist terminal job record");
        }
        result
    }

    async fn enter(
        &mut self,
        phase: Phase,
        status: impl FnOnce(&mut ProgressSnapshot),
    ) -> Result<PhaseTimer, Abort> {
        self.check_cancelled()?;
        if phase > self.record.phase {
            self.record.phase = phase;
        }
        self.handles.progress.enter_phase(phase);
        self.handles.progress.update(status);
        info!(phase = %phase, "Phase started");
        self.emit(
            "phase.started",
            json!({ "job_id": self.record.job_id(), "phase": phase }),
        );
        self.checkpoint().await?;
        Ok(PhaseTimer::start(phase))
    }

    async fn complete_phase(&mut self, timer: PhaseTimer) -> Result<(), Abort> {
        let phase = timer.phase();
        let duration_ms = timer.finish();
        info!(phase = %phase, duration_ms, "Phase complete");
        self.emit(
            "phase.completed",
            json!({
                "job_id": self.record.job_id(),
                "phase": phase,
                "duration_ms": duration_ms,
            }),
        );
        self.checkpoint().await
    }

    /// Persists the record. Skipped once the job is cancelled.
    async fn checkpoint(&mut self) -> Result<(), Abort> {
        self.check_cancelled()?;
        self.record.progress = self.handles.progress.snapshot();
        self.record.touch();
        self.runtime
            .store
            .save(&self.record)
            .await
            .map_err(Abort::Store)
    }

    fn check_cancelled(&self) -> Result<(), Abort> {
        if self.handles.cancel.is_cancelled() {
            Err(self.cancelled())
        } else {
            Ok(())
        }
    }

    fn cancelled(&self) -> Abort {
        Abort::Cancelled(
            self.handles
                .cancel
                .reason()
                .unwrap_or_else(|| "job cancelled".to_string()),
        )
    }

    fn emit(&self, event_type: &str, data: Value) {
        self.runtime.events.try_emit(event_type, Some(data));
    }
}

/// Renders a wait duration for operator-facing warnings.
fn describe_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    match secs {
        0 => format!("{}ms", wait.as_millis()),
        1 => "1 second".to_string(),
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("job_id", &self.record.job_id())
            .field("phase", &self.record.phase)
            .field("status", &self.record.status)
            .finish()
    }
}
