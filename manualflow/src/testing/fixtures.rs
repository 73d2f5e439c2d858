//! Test fixtures wiring mock collaborators together.

use std::sync::Arc;

use super::mocks::{
    MockCleanupService, MockOcrService, MockProductLookup, MockServiceFactory,
    MockSiteRenderer, MockTranslationService,
};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::JobRequest;
use crate::events::EventSink;
use crate::gateway::Services;
use crate::phases::PhaseContext;
use crate::retry::RetryExecutor;

/// Typed handles to every mock in a bundle, for assertions.
#[derive(Debug, Clone)]
pub struct TestServices {
    /// Product lookup mock.
    pub lookup: Arc<MockProductLookup>,
    /// OCR mock.
    pub ocr: Arc<MockOcrService>,
    /// Translation mock.
    pub translation: Arc<MockTranslationService>,
    /// Renderer mock.
    pub renderer: Arc<MockSiteRenderer>,
    /// Cleanup mock.
    pub cleanup: Arc<MockCleanupService>,
}

impl TestServices {
    /// A healthy bundle over a document of `pages` pages whose product is found.
    #[must_use]
    pub fn new(pages: usize) -> Self {
        Self {
            lookup: Arc::new(MockProductLookup::found(
                "https://example.com/products/tr-808",
                "TR-808",
            )),
            ocr: Arc::new(MockOcrService::new(pages)),
            translation: Arc::new(MockTranslationService::new()),
            renderer: Arc::new(MockSiteRenderer::new()),
            cleanup: Arc::new(MockCleanupService::new()),
        }
    }

    /// Replaces the lookup mock.
    #[must_use]
    pub fn with_lookup(mut self, lookup: MockProductLookup) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Replaces the OCR mock.
    #[must_use]
    pub fn with_ocr(mut self, ocr: MockOcrService) -> Self {
        self.ocr = Arc::new(ocr);
        self
    }

    /// Replaces the translation mock.
    #[must_use]
    pub fn with_translation(mut self, translation: MockTranslationService) -> Self {
        self.translation = Arc::new(translation);
        self
    }

    /// Replaces the renderer mock.
    #[must_use]
    pub fn with_renderer(mut self, renderer: MockSiteRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Replaces the cleanup mock.
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: MockCleanupService) -> Self {
        self.cleanup = Arc::new(cleanup);
        self
    }

    /// The bundle as trait objects.
    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            lookup: self.lookup.clone(),
            ocr: self.ocr.clone(),
            translation: self.translation.clone(),
            renderer: self.renderer.clone(),
            cleanup: self.cleanup.clone(),
        }
    }

    /// A factory handing out this bundle.
    #[must_use]
    pub fn factory(&self) -> Arc<MockServiceFactory> {
        Arc::new(MockServiceFactory::new(self.services()))
    }

    /// A phase context over this bundle.
    #[must_use]
    pub fn phase_context(
        &self,
        config: PipelineConfig,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> PhaseContext {
        let executor = RetryExecutor::new("test-job", config.retry.clone(), events, cancel);
        PhaseContext::new("test-job", self.services(), executor, Arc::new(config))
    }
}

/// A request for a sample manual.
#[must_use]
pub fn sample_request(manual_name: &str) -> JobRequest {
    JobRequest::new(format!("scans/{manual_name}.pdf"), manual_name)
}
