//! Request and response payloads exchanged with remote collaborators.

use crate::core::{ProductInfo, TextBlock, TranslatedBlock};
use serde::{Deserialize, Serialize};

/// Answer of the product lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LookupResult {
    /// Whether a matching product was found.
    pub found: bool,
    /// Product page URL.
    pub url: String,
    /// Official product name.
    pub official_name: String,
    /// Short product description.
    pub description: String,
    /// Related pages such as blog posts.
    pub related_links: Vec<String>,
}

impl LookupResult {
    /// A lookup that matched nothing.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Converts into product metadata; empty when nothing was found.
    #[must_use]
    pub fn into_product(self) -> ProductInfo {
        if !self.found {
            return ProductInfo::default();
        }
        ProductInfo {
            url: self.url,
            name: self.official_name,
            description: self.description,
            related_links: self.related_links,
        }
    }
}

/// Batch translation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateRequest {
    /// Blocks to translate.
    pub blocks: Vec<TextBlock>,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
}

/// Metadata embedded into the rendered site.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteMeta {
    /// Manual name.
    pub manual_name: String,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Resolved product URL, possibly empty.
    pub product_url: String,
    /// Related links discovered by lookup.
    pub related_links: Vec<String>,
}

/// Site rendering request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Source document reference.
    pub document: String,
    /// Blocks to lay out.
    pub blocks: Vec<TranslatedBlock>,
    /// Output location.
    pub output_dir: String,
    /// Embedded metadata.
    pub meta: SiteMeta,
    /// Stable key so a replayed render re-attaches to the first one.
    pub idempotency_key: String,
}

/// Paths and counts produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderedSite {
    /// Rendered JSON document.
    pub json_path: String,
    /// Rendered HTML page.
    pub html_path: String,
    /// Pages rendered.
    pub page_count: usize,
    /// Blocks rendered.
    pub block_count: usize,
}

/// Input shared by the three cleanup sub-stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupRequest {
    /// Rendered JSON document to clean in place.
    pub json_path: String,
    /// Product name known so far.
    pub product_name: String,
    /// Product description known so far.
    pub product_description: String,
    /// Stable key for this job's cleanup; each sub-stage may suffix it.
    pub idempotency_key: String,
}

/// Result of the LLM correction sub-stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Correction {
    /// Corrections applied.
    pub corrections: usize,
    /// Product name as corrected by the LLM.
    pub corrected_name: Option<String>,
    /// Suggested tags.
    pub tags: Vec<String>,
}
