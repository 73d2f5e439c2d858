//! Job-scoped cooperative cancellation.
//!
//! A single [`CancellationToken`] is created per job and shared by the
//! orchestrator, every fan-out page task, the retry engine's backoff sleeps
//! and the product URL wait.

mod token;

pub use token::CancellationToken;
