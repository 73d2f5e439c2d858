//! Remote task gateway.
//!
//! One trait per external collaborator. Every call returns a tagged
//! `Result<_, ServiceError>`; phase modules branch on
//! [`ServiceErrorKind`](crate::errors::ServiceErrorKind) and never inspect
//! loosely-typed payloads. A [`ServiceFactory`] builds the bundle of handles
//! at job start; the bundle is dropped when the job ends.

mod types;

pub use types::{
    Correction, CleanupRequest, LookupResult, RenderRequest, RenderedSite, SiteMeta,
    TranslateRequest,
};

use crate::config::ServiceSettings;
use crate::core::{TextBlock, TranslatedBlock};
use crate::errors::ServiceError;
use crate::retry::Heartbeat;
use async_trait::async_trait;
use std::sync::Arc;

/// Finds a product page for a manual.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Looks up a product by manual name.
    async fn lookup(&self, manual_name: &str) -> Result<LookupResult, ServiceError>;
}

/// Extracts text regions from document pages.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Returns the number of pages in a document.
    async fn page_count(&self, document: &str) -> Result<usize, ServiceError>;

    /// Extracts the text blocks of one page.
    async fn ocr_page(&self, document: &str, page: usize) -> Result<Vec<TextBlock>, ServiceError>;
}

/// Translates text blocks in one batch.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Translates every block, preserving geometry.
    async fn translate(&self, request: &TranslateRequest) -> Result<Vec<TranslatedBlock>, ServiceError>;
}

/// Renders a translated manual.
#[async_trait]
pub trait SiteRenderer: Send + Sync {
    /// Renders the JSON document and HTML page.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedSite, ServiceError>;
}

/// The three cleanup sub-services, invoked in this order.
#[async_trait]
pub trait CleanupService: Send + Sync {
    /// Deterministic encoding normalization; returns the number of fixes.
    async fn normalize_text(&self, request: &CleanupRequest) -> Result<usize, ServiceError>;

    /// Deterministic noise removal; returns the number of removals.
    async fn remove_noise(&self, request: &CleanupRequest) -> Result<usize, ServiceError>;

    /// LLM-based correction.
    ///
    /// Long calls should beat `heartbeat` so the supervisor does not treat
    /// them as hung.
    async fn correct(
        &self,
        request: &CleanupRequest,
        heartbeat: Heartbeat,
    ) -> Result<Correction, ServiceError>;
}

/// Handles to every collaborator, owned by one job.
#[derive(Clone)]
pub struct Services {
    /// Product lookup.
    pub lookup: Arc<dyn ProductLookup>,
    /// OCR.
    pub ocr: Arc<dyn OcrService>,
    /// Translation.
    pub translation: Arc<dyn TranslationService>,
    /// Site rendering.
    pub renderer: Arc<dyn SiteRenderer>,
    /// Cleanup sub-services.
    pub cleanup: Arc<dyn CleanupService>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Builds collaborator handles from settings.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    /// Connects every collaborator for one job.
    async fn connect(&self, settings: &ServiceSettings) -> Result<Services, ServiceError>;
}

/// A pre-built bundle hands out clones of itself.
#[async_trait]
impl ServiceFactory for Services {
    async fn connect(&self, _settings: &ServiceSettings) -> Result<Services, ServiceError> {
        Ok(self.clone())
    }
}
