//! Core domain model types for manualflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Phase and job status enums
//! - Text blocks and page tasks produced by the OCR fan-out
//! - Phase output records passed between phases
//! - Job requests, results and progress snapshots

mod blocks;
mod job;
mod outputs;
mod phase;

pub use blocks::{BoundingBox, PageFailure, PageResult, PageTask, TextBlock, TranslatedBlock};
pub use job::{JobInput, JobRequest, JobResult, ProgressSnapshot};
pub use outputs::{CleanupOutput, OcrOutput, ProductInfo, SiteOutput, TranslationOutput};
pub use phase::{JobStatus, Phase};
