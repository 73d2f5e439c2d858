//! Utility functions for ids and timestamps.

mod ids;
pub mod timestamps;

pub use ids::{derive_job_id, generate_idempotency_key, generate_uuid, with_unique_suffix};
pub use timestamps::{compact_stamp, elapsed_ms, iso_timestamp, now_utc, Timestamp};
