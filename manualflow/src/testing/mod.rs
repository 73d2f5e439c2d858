//! Testing utilities for manualflow.
//!
//! This module provides:
//! - Scriptable mock collaborators with call tracking
//! - Fixtures bundling the mocks into services and phase contexts

mod fixtures;
mod mocks;

pub use fixtures::{sample_request, TestServices};
pub use mocks::{
    MockCleanupService, MockOcrService, MockProductLookup, MockServiceFactory,
    MockSiteRenderer, MockTranslationService,
};
