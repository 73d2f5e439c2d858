//! Event sink system for observability.
//!
//! Lifecycle events (`job.*`, `phase.*`, `call.*`, `ocr.page_failed`,
//! `cleanup.stage_failed`) are emitted through an injected [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
