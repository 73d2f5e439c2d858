//! Retry and backoff policy engine.
//!
//! This module provides:
//! - Canonical retry policies per operation class
//! - An executor applying a policy, per-attempt timeouts and cancellation
//! - Heartbeat supervision for long-running LLM calls

mod executor;
mod heartbeat;
mod policy;

pub use executor::{CallSpec, RetryExecutor};
pub use heartbeat::{Heartbeat, HeartbeatMonitor};
pub use policy::{JitterStrategy, OperationClass, RetryPolicies, RetryPolicy};
