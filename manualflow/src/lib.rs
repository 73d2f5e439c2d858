//! # Manualflow
//!
//! Durable orchestration for translating scanned manuals.
//!
//! A job moves through four phases, each backed by a remote collaborator:
//!
//! - **OCR**: the document is split into pages and every page is recognised
//!   concurrently; isolated page failures become warnings
//! - **Translation**: the surviving text blocks are translated in one call
//! - **Site generation**: the translated blocks are rendered into a viewer
//! - **Cleanup**: encoding normalisation, noise removal and a supervised LLM
//!   correction pass, none of which can fail the job
//!
//! When the product lookup finds no URL the job suspends after OCR until an
//! operator provides one or thirty minutes pass. Every phase output is
//! checkpointed so a restarted job resumes where it stopped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use manualflow::prelude::*;
//!
//! let service = JobService::new(
//!     PipelineConfig::from_json_file("manualflow.json")?,
//!     Arc::new(FileJobStore::open("jobs")?),
//!     factory,
//!     Arc::new(LoggingEventSink::default()),
//! )?;
//!
//! let job_id = service.start_job(JobRequest::new("scans/tr-808.pdf", "TR-808")).await?;
//! let result = service.await_result(&job_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod observability;
pub mod orchestrator;
pub mod phases;
pub mod progress;
pub mod retry;
pub mod store;
pub mod suspension;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{CallTimeouts, PipelineConfig, ServiceSettings};
    pub use crate::core::{
        JobRequest, JobResult, JobStatus, Phase, ProductInfo, ProgressSnapshot, TextBlock,
        TranslatedBlock,
    };
    pub use crate::errors::{PipelineError, ServiceError, ServiceErrorKind, SignalError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::gateway::{
        CleanupService, OcrService, ProductLookup, ServiceFactory, Services, SiteRenderer,
        TranslationService,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::{JobService, JobSummary};
    pub use crate::retry::{Heartbeat, OperationClass, RetryPolicies, RetryPolicy};
    pub use crate::store::{FileJobStore, InMemoryJobStore, JobStore};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
