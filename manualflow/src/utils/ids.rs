//! Job id and idempotency key generation.

use super::timestamps::{compact_stamp, Timestamp};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Derives a job id: `translate-<name>-<YYYYmmdd-HHMMSS>`.
///
/// Spaces in the manual name become dashes; any other character that is not
/// alphanumeric, `-` or `_` is dropped so the id is a safe file name.
#[must_use]
pub fn derive_job_id(manual_name: &str, started_at: &Timestamp) -> String {
    format!(
        "translate-{}-{}",
        sanitize_name(manual_name),
        compact_stamp(started_at)
    )
}

/// Appends a short random suffix to an id that is already taken.
#[must_use]
pub fn with_unique_suffix(job_id: &str) -> String {
    let uuid = generate_uuid().simple().to_string();
    format!("{job_id}-{}", &uuid[..8])
}

fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || matches!(c, '-' | '_') => Some(c),
            _ => None,
        })
        .collect()
}

/// Generates an idempotency key from components.
#[must_use]
pub fn generate_idempotency_key(components: &[&str]) -> String {
    let combined = components.join(":");
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    let result = hasher.finalize();
    format!("idem:{}", hex::encode(&result[..16]))
}
