//! Error types for manualflow.
//!
//! Remote collaborators report failures as a tagged [`ServiceError`] so phase
//! modules branch on [`ServiceErrorKind`] instead of inspecting loosely-typed
//! maps. Everything that can fail at the job boundary is folded into
//! [`PipelineError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure class of a single remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// Network or service hiccup; safe to retry.
    Transient,
    /// The service rejected the request; retrying will not help.
    Permanent,
    /// The service answered but the payload failed validation.
    Validation,
    /// The call exceeded its start-to-close timeout.
    Timeout,
    /// A supervised call stopped sending heartbeats.
    HeartbeatTimeout,
    /// The owning job was cancelled.
    Cancelled,
}

impl ServiceErrorKind {
    /// Returns true if a failure of this kind may be retried by policy.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Timeout | Self::HeartbeatTimeout)
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Validation => write!(f, "validation"),
            Self::Timeout => write!(f, "timeout"),
            Self::HeartbeatTimeout => write!(f, "heartbeat_timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A typed failure returned by a remote collaborator or the retry engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    /// The failure class.
    pub kind: ServiceErrorKind,
    /// Human-readable cause.
    pub message: String,
}

impl ServiceError {
    /// Creates a new service error.
    #[must_use]
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a transient (retryable) error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Transient, message)
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Permanent, message)
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Validation, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, message)
    }

    /// Creates a heartbeat timeout error.
    #[must_use]
    pub fn heartbeat_timeout(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::HeartbeatTimeout, message)
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Cancelled, message)
    }

    /// Returns true if the error may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the error was caused by job cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ServiceErrorKind::Cancelled
    }
}

/// Errors raised by a job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record is terminal and can no longer be written.
    #[error("job '{0}' is terminal and cannot be modified")]
    Immutable(String),

    /// The job id cannot be used as a storage key.
    #[error("invalid job id for storage: '{0}'")]
    InvalidKey(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised when delivering a product URL signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The suspension already resumed; late signals have no effect.
    #[error("job '{0}' already resumed from its product URL wait")]
    AlreadyResumed(String),

    /// A signal was already captured for this suspension.
    #[error("a product URL was already provided for job '{0}'")]
    AlreadyDelivered(String),

    /// The job resolved its product URL without waiting for input.
    #[error("job '{0}' is not awaiting a product URL")]
    NotAwaitingInput(String),

    /// The job is not running in this process.
    #[error("job '{0}' is not running")]
    JobNotRunning(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The logging subscriber could not be installed.
    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The main error type at the job-service boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The job id is not known to this service or its store.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// The job request is malformed.
    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    /// A remote collaborator could not be constructed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// The job store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A signal could not be delivered.
    #[error("{0}")]
    Signal(#[from] SignalError),

    /// Configuration was rejected.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ServiceErrorKind::Transient.is_retryable());
        assert!(ServiceErrorKind::Timeout.is_retryable());
        assert!(ServiceErrorKind::HeartbeatTimeout.is_retryable());
        assert!(!ServiceErrorKind::Permanent.is_retryable());
        assert!(!ServiceErrorKind::Validation.is_retryable());
        assert!(!ServiceErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::transient("connection reset");
        assert_eq!(err.to_string(), "transient: connection reset");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_service_error_serialize() {
        let err = ServiceError::heartbeat_timeout("no beat");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "heartbeat_timeout");

        let back: ServiceError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_pipeline_error_from_signal() {
        let err: PipelineError = SignalError::AlreadyResumed("job-1".into()).into();
        assert!(err.to_string().contains("already resumed"));
    }

    #[test]
    fn test_store_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = parse.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
