//! Scriptable mock collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::ServiceSettings;
use crate::core::{BoundingBox, TextBlock, TranslatedBlock};
use crate::errors::ServiceError;
use crate::gateway::{
    CleanupRequest, CleanupService, Correction, LookupResult, OcrService, ProductLookup,
    RenderRequest, RenderedSite, ServiceFactory, Services, SiteRenderer, TranslateRequest,
    TranslationService,
};
use crate::retry::Heartbeat;

/// A product lookup returning a fixed answer.
#[derive(Debug)]
pub struct MockProductLookup {
    result: Mutex<Result<LookupResult, ServiceError>>,
    calls: AtomicUsize,
}

impl MockProductLookup {
    /// Finds a product at `url`.
    #[must_use]
    pub fn found(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_result(Ok(LookupResult {
            found: true,
            url: url.into(),
            official_name: name.into(),
            description: "Mock product".to_string(),
            related_links: Vec::new(),
        }))
    }

    /// Finds nothing.
    #[must_use]
    pub fn not_found() -> Self {
        Self::with_result(Ok(LookupResult::not_found()))
    }

    /// Fails every call.
    #[must_use]
    pub fn failing(error: ServiceError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<LookupResult, ServiceError>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductLookup for MockProductLookup {
    async fn lookup(&self, _manual_name: &str) -> Result<LookupResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().clone()
    }
}

/// An OCR service over a synthetic document.
///
/// Every page yields `blocks_per_page` blocks unless scripted to fail. Pages
/// may also be delayed to shuffle completion order.
#[derive(Debug)]
pub struct MockOcrService {
    pages: usize,
    blocks_per_page: usize,
    permanent_failures: Mutex<HashMap<usize, ServiceError>>,
    transient_failures: Mutex<HashMap<usize, usize>>,
    delays: Mutex<HashMap<usize, Duration>>,
    page_calls: Mutex<HashMap<usize, usize>>,
    page_count_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockOcrService {
    /// Creates a document with `pages` pages of two blocks each.
    #[must_use]
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            blocks_per_page: 2,
            permanent_failures: Mutex::new(HashMap::new()),
            transient_failures: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            page_calls: Mutex::new(HashMap::new()),
            page_count_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the number of blocks per page.
    #[must_use]
    pub fn with_blocks_per_page(mut self, blocks: usize) -> Self {
        self.blocks_per_page = blocks;
        self
    }

    /// Makes a page fail permanently.
    #[must_use]
    pub fn failing_page(self, page: usize) -> Self {
        self.permanent_failures
            .lock()
            .insert(page, ServiceError::permanent(format!("page {page} unreadable")));
        self
    }

    /// Makes a page fail transiently `times` times before succeeding.
    #[must_use]
    pub fn flaky_page(self, page: usize, times: usize) -> Self {
        self.transient_failures.lock().insert(page, times);
        self
    }

    /// Delays a page's answer.
    #[must_use]
    pub fn delayed_page(self, page: usize, delay: Duration) -> Self {
        self.delays.lock().insert(page, delay);
        self
    }

    /// Calls made for one page.
    #[must_use]
    pub fn page_calls(&self, page: usize) -> usize {
        self.page_calls.lock().get(&page).copied().unwrap_or(0)
    }

    /// Calls made across all pages.
    #[must_use]
    pub fn total_page_calls(&self) -> usize {
        self.page_calls.lock().values().sum()
    }

    /// Distinct pages called.
    #[must_use]
    pub fn pages_called(&self) -> usize {
        self.page_calls.lock().len()
    }

    /// Page count queries made.
    #[must_use]
    pub fn page_count_calls(&self) -> usize {
        self.page_count_calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent page calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for MockOcrService {
    async fn page_count(&self, _document: &str) -> Result<usize, ServiceError> {
        self.page_count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages)
    }

    async fn ocr_page(&self, _document: &str, page: usize) -> Result<Vec<TextBlock>, ServiceError> {
        *self.page_calls.lock().entry(page).or_insert(0) += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delays.lock().get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.permanent_failures.lock().get(&page) {
            return Err(error.clone());
        }
        {
            let mut transient = self.transient_failures.lock();
            if let Some(remaining) = transient.get_mut(&page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ServiceError::transient(format!("page {page} busy")));
                }
            }
        }

        Ok((0..self.blocks_per_page)
            .map(|i| {
                TextBlock::new(
                    format!("ページ{page}-{i}"),
                    page,
                    BoundingBox::new(0.1, 0.1 * i as f64, 0.5, 0.05),
                    0.95,
                )
            })
            .collect())
    }
}

/// A translation service that prefixes each block with the target language.
#[derive(Debug, Default)]
pub struct MockTranslationService {
    error: Mutex<Option<ServiceError>>,
    calls: AtomicUsize,
}

impl MockTranslationService {
    /// Creates a working translator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a translator that always fails.
    #[must_use]
    pub fn failing(error: ServiceError) -> Self {
        Self {
            error: Mutex::new(Some(error)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of translate calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationService for MockTranslationService {
    async fn translate(&self, request: &TranslateRequest) -> Result<Vec<TranslatedBlock>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error.lock().clone() {
            return Err(error);
        }
        Ok(request
            .blocks
            .iter()
            .map(|b| TranslatedBlock::from_source(b, format!("[{}] {}", request.target_lang, b.text)))
            .collect())
    }
}

/// A renderer that reports paths under the output directory.
#[derive(Debug, Default)]
pub struct MockSiteRenderer {
    error: Mutex<Option<ServiceError>>,
    requests: Mutex<Vec<RenderRequest>>,
}

impl MockSiteRenderer {
    /// Creates a working renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer that always fails.
    #[must_use]
    pub fn failing(error: ServiceError) -> Self {
        Self {
            error: Mutex::new(Some(error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of render calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received.
    #[must_use]
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SiteRenderer for MockSiteRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedSite, ServiceError> {
        self.requests.lock().push(request.clone());
        if let Some(error) = self.error.lock().clone() {
            return Err(error);
        }
        let mut pages: Vec<usize> = request.blocks.iter().map(|b| b.page).collect();
        pages.dedup();
        Ok(RenderedSite {
            json_path: format!("{}/translated.json", request.output_dir),
            html_path: format!("{}/index.html", request.output_dir),
            page_count: pages.len(),
            block_count: request.blocks.len(),
        })
    }
}

/// Cleanup sub-services with scripted outcomes.
#[derive(Debug)]
pub struct MockCleanupService {
    normalize: Mutex<Result<usize, ServiceError>>,
    noise: Mutex<Result<usize, ServiceError>>,
    correction: Mutex<Result<Correction, ServiceError>>,
    llm_duration: Mutex<Option<(Duration, Option<Duration>)>>,
    calls: Mutex<Vec<String>>,
    keys: Mutex<Vec<String>>,
}

impl Default for MockCleanupService {
    fn default() -> Self {
        Self {
            normalize: Mutex::new(Ok(3)),
            noise: Mutex::new(Ok(1)),
            correction: Mutex::new(Ok(Correction {
                corrections: 5,
                corrected_name: None,
                tags: vec!["synthesizer".to_string()],
            })),
            llm_duration: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        }
    }
}

impl MockCleanupService {
    /// Creates sub-services that all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the normalization result.
    #[must_use]
    pub fn with_normalize(self, result: Result<usize, ServiceError>) -> Self {
        *self.normalize.lock() = result;
        self
    }

    /// Scripts the noise removal result.
    #[must_use]
    pub fn with_noise(self, result: Result<usize, ServiceError>) -> Self {
        *self.noise.lock() = result;
        self
    }

    /// Scripts the LLM correction result.
    #[must_use]
    pub fn with_correction(self, result: Result<Correction, ServiceError>) -> Self {
        *self.correction.lock() = result;
        self
    }

    /// Makes the LLM call take `duration`, beating every `beat_every` if set.
    #[must_use]
    pub fn with_llm_duration(self, duration: Duration, beat_every: Option<Duration>) -> Self {
        *self.llm_duration.lock() = Some((duration, beat_every));
        self
    }

    /// Sub-stage calls in order: `normalize`, `noise`, `correct`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Idempotency keys received, in call order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    fn record(&self, stage: &str, request: &CleanupRequest) {
        self.calls.lock().push(stage.to_string());
        self.keys.lock().push(request.idempotency_key.clone());
    }
}

#[async_trait]
impl CleanupService for MockCleanupService {
    async fn normalize_text(&self, request: &CleanupRequest) -> Result<usize, ServiceError> {
        self.record("normalize", request);
        self.normalize.lock().clone()
    }

    async fn remove_noise(&self, request: &CleanupRequest) -> Result<usize, ServiceError> {
        self.record("noise", request);
        self.noise.lock().clone()
    }

    async fn correct(
        &self,
        request: &CleanupRequest,
        heartbeat: Heartbeat,
    ) -> Result<Correction, ServiceError> {
        self.record("correct", request);
        let duration = *self.llm_duration.lock();
        if let Some((total, beat_every)) = duration {
            match beat_every {
                Some(interval) if !interval.is_zero() => {
                    let mut elapsed = Duration::ZERO;
                    while elapsed < total {
                        tokio::time::sleep(interval).await;
                        elapsed += interval;
                        heartbeat.beat();
                    }
                }
                _ => tokio::time::sleep(total).await,
            }
        }
        self.correction.lock().clone()
    }
}

/// A factory handing out a fixed bundle and counting connections.
#[derive(Debug)]
pub struct MockServiceFactory {
    services: Services,
    error: Mutex<Option<ServiceError>>,
    connects: AtomicUsize,
}

impl MockServiceFactory {
    /// Creates a factory over a bundle.
    #[must_use]
    pub fn new(services: Services) -> Self {
        Self {
            services,
            error: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    /// Makes every connect fail.
    pub fn fail_with(&self, error: ServiceError) {
        *self.error.lock() = Some(error);
    }

    /// Number of connects made.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceFactory for MockServiceFactory {
    async fn connect(&self, _settings: &ServiceSettings) -> Result<Services, ServiceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error.lock().clone() {
            return Err(error);
        }
        Ok(self.services.clone())
    }
}
