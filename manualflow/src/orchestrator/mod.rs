//! Job orchestration.
//!
//! This module provides:
//! - [`PipelineOrchestrator`], the per-job state machine
//! - [`JobService`], the API for starting, observing, signalling and
//!   cancelling jobs

mod runner;
mod service;

pub use runner::{JobHandles, JobRuntime, PipelineOrchestrator};
pub use service::{JobService, JobSummary};
