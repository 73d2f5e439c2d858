//! Observability utilities.
//!
//! Library code only emits through `tracing`; binaries and tests choose a
//! subscriber with [`init_tracing`].

mod timer;

pub use timer::PhaseTimer;

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}

/// Installs a global subscriber honoring `RUST_LOG`.
///
/// Falls back to `manualflow=info,warn` when `RUST_LOG` is unset or invalid.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), ConfigError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("manualflow=info,warn"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Plain => registry
            .with(fmt::layer().with_target(false).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}

/// Span wrapping one job's execution.
#[must_use]
pub fn job_span(job_id: &str, manual_name: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "job",
        job_id = %job_id,
        manual_name = %manual_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Plain);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_tracing(LogFormat::Plain);
        assert!(matches!(
            init_tracing(LogFormat::Json),
            Err(ConfigError::Logging(_))
        ));
    }
}
