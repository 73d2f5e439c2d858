//! Phase output records.
//!
//! Each record is consumed verbatim by the next phase. A failed output carries
//! its error and an empty payload; constructors enforce that.

use super::blocks::{TextBlock, TranslatedBlock};
use serde::{Deserialize, Serialize};

/// Product metadata discovered by lookup or supplied by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Product page URL; empty when unresolved.
    pub url: String,
    /// Official product name.
    pub name: String,
    /// Short product description.
    pub description: String,
    /// Related pages such as blog posts.
    pub related_links: Vec<String>,
}

impl ProductInfo {
    /// Creates product info carrying only a URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Returns true if a product URL is known.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Output of the OCR phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Whether at least one block was extracted.
    pub success: bool,
    /// Failure cause when `success` is false.
    pub error: Option<String>,
    /// Blocks from every surviving page, in page order.
    pub blocks: Vec<TextBlock>,
    /// Number of pages in the document.
    pub page_count: usize,
    /// Pages whose OCR call failed.
    pub failed_pages: Vec<usize>,
}

impl OcrOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn succeeded(blocks: Vec<TextBlock>, page_count: usize, failed_pages: Vec<usize>) -> Self {
        Self {
            success: true,
            error: None,
            blocks,
            page_count,
            failed_pages,
        }
    }

    /// Creates a failed output with an empty payload.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Progress status line for a completed OCR phase.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!(
            "Complete: {} blocks from {} pages",
            self.blocks.len(),
            self.page_count
        )
    }
}

/// Output of the translation phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranslationOutput {
    /// Whether translation succeeded.
    pub success: bool,
    /// Failure cause when `success` is false.
    pub error: Option<String>,
    /// Translated blocks.
    pub blocks: Vec<TranslatedBlock>,
}

impl TranslationOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn succeeded(blocks: Vec<TranslatedBlock>) -> Self {
        Self {
            success: true,
            error: None,
            blocks,
        }
    }

    /// Creates a failed output with an empty payload.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Progress status line for a completed translation phase.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("Complete: {} blocks", self.blocks.len())
    }
}

/// Output of the site-generation phase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteOutput {
    /// Whether rendering succeeded.
    pub success: bool,
    /// Failure cause when `success` is false.
    pub error: Option<String>,
    /// Path of the rendered JSON document.
    pub json_path: String,
    /// Path of the rendered HTML page.
    pub html_path: String,
    /// Pages rendered.
    pub page_count: usize,
    /// Blocks rendered.
    pub block_count: usize,
}

impl SiteOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn succeeded(
        json_path: impl Into<String>,
        html_path: impl Into<String>,
        page_count: usize,
        block_count: usize,
    ) -> Self {
        Self {
            success: true,
            error: None,
            json_path: json_path.into(),
            html_path: html_path.into(),
            page_count,
            block_count,
        }
    }

    /// Creates a failed output with an empty payload.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Progress status line for a completed site-generation phase.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("Complete: {} pages", self.page_count)
    }
}

/// Output of the cleanup phase.
///
/// Cleanup never fails the job: `success` is always true and sub-stage
/// failures surface through `warnings` and `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOutput {
    /// Always true.
    pub success: bool,
    /// Error of the LLM correction stage, if it failed.
    pub error: Option<String>,
    /// Encoding fixes applied by normalization.
    pub normalization_fixes: usize,
    /// Blocks removed as noise.
    pub noise_removals: usize,
    /// Corrections applied by the LLM.
    pub llm_corrections: usize,
    /// Product name as corrected by the LLM.
    pub corrected_product_name: Option<String>,
    /// Tags suggested by the LLM.
    pub tags: Vec<String>,
    /// One entry per failed or skipped sub-stage.
    pub warnings: Vec<String>,
    /// True when the whole phase was skipped.
    #[serde(default)]
    pub skipped: bool,
}

impl Default for CleanupOutput {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            normalization_fixes: 0,
            noise_removals: 0,
            llm_corrections: 0,
            corrected_product_name: None,
            tags: Vec::new(),
            warnings: Vec::new(),
            skipped: false,
        }
    }
}

impl CleanupOutput {
    /// Output recorded when cleanup is skipped for the job.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Composite status line over the three sub-stage counters.
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.skipped {
            return "Skipped".to_string();
        }
        format!(
            "Complete: {} encoding fixes, {} noise removals, {} AI corrections",
            self.normalization_fixes, self.noise_removals, self.llm_corrections
        )
    }
}
