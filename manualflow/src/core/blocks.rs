//! Page-level text blocks and fan-out task types.

use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};

/// Normalized bounding box; every coordinate lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl BoundingBox {
    /// Creates a bounding box, clamping each coordinate into `[0, 1]`.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
            width: clamp_unit(width),
            height: clamp_unit(height),
        }
    }

    /// Returns true if every coordinate is within `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A text region extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Extracted text.
    pub text: String,
    /// Zero-based page index.
    pub page: usize,
    /// Region geometry.
    #[serde(flatten)]
    pub bbox: BoundingBox,
    /// OCR confidence score.
    pub confidence: f64,
}

impl TextBlock {
    /// Creates a text block.
    #[must_use]
    pub fn new(text: impl Into<String>, page: usize, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            confidence,
        }
    }
}

/// A text block with its translation; keeps the source geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedBlock {
    /// Source text.
    pub original: String,
    /// Translated text.
    pub translated: String,
    /// Zero-based page index.
    pub page: usize,
    /// Region geometry, copied from the source block.
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

impl TranslatedBlock {
    /// Builds a translated block from its source block.
    #[must_use]
    pub fn from_source(block: &TextBlock, translated: impl Into<String>) -> Self {
        Self {
            original: block.text.clone(),
            translated: translated.into(),
            page: block.page,
            bbox: block.bbox,
        }
    }
}

/// One unit of OCR fan-out work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageTask {
    /// Owning job.
    pub job_id: String,
    /// Zero-based page index.
    pub page: usize,
}

/// A page whose OCR call failed after retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    /// Zero-based page index.
    pub page: usize,
    /// Terminal error of the page task.
    pub error: ServiceError,
}

/// Outcome of one page task.
pub type PageResult = Result<Vec<TextBlock>, PageFailure>;
