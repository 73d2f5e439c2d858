//! Pipeline configuration.
//!
//! Configuration is loaded explicitly, validated once, and handed to the job
//! service at construction. Each job copies it at start; nothing is read from
//! the environment while a job runs.

use crate::errors::ConfigError;
use crate::retry::RetryPolicies;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Identifiers and credentials for the remote collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Cloud project id.
    #[serde(default)]
    pub project_id: String,
    /// Processor location.
    #[serde(default = "default_location")]
    pub location: String,
    /// OCR processor id.
    #[serde(default)]
    pub processor_id: String,
    /// Path to a credentials file, if any.
    #[serde(default)]
    pub credentials_path: Option<String>,
}

fn default_location() -> String {
    "us".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            processor_id: String::new(),
            credentials_path: None,
        }
    }
}

/// Start-to-close timeouts for each remote call, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTimeouts {
    /// Product lookup.
    pub lookup_ms: u64,
    /// Page count query.
    pub page_count_ms: u64,
    /// One page of OCR.
    pub ocr_page_ms: u64,
    /// Batch translation.
    pub translation_ms: u64,
    /// Site rendering.
    pub render_ms: u64,
    /// Text normalization.
    pub normalize_ms: u64,
    /// Noise removal.
    pub noise_removal_ms: u64,
    /// LLM correction.
    pub llm_ms: u64,
    /// Maximum silence between LLM heartbeats.
    pub llm_heartbeat_ms: u64,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            lookup_ms: 30_000,
            page_count_ms: 60_000,
            ocr_page_ms: 120_000,
            translation_ms: 300_000,
            render_ms: 600_000,
            normalize_ms: 120_000,
            noise_removal_ms: 120_000,
            llm_ms: 300_000,
            llm_heartbeat_ms: 120_000,
        }
    }
}

impl CallTimeouts {
    /// Product lookup timeout.
    #[must_use]
    pub fn lookup(&self) -> Duration {
        Duration::from_millis(self.lookup_ms)
    }

    /// Page count timeout.
    #[must_use]
    pub fn page_count(&self) -> Duration {
        Duration::from_millis(self.page_count_ms)
    }

    /// Per-page OCR timeout.
    #[must_use]
    pub fn ocr_page(&self) -> Duration {
        Duration::from_millis(self.ocr_page_ms)
    }

    /// Translation timeout.
    #[must_use]
    pub fn translation(&self) -> Duration {
        Duration::from_millis(self.translation_ms)
    }

    /// Rendering timeout.
    #[must_use]
    pub fn render(&self) -> Duration {
        Duration::from_millis(self.render_ms)
    }

    /// Normalization timeout.
    #[must_use]
    pub fn normalize(&self) -> Duration {
        Duration::from_millis(self.normalize_ms)
    }

    /// Noise removal timeout.
    #[must_use]
    pub fn noise_removal(&self) -> Duration {
        Duration::from_millis(self.noise_removal_ms)
    }

    /// LLM correction timeout.
    #[must_use]
    pub fn llm(&self) -> Duration {
        Duration::from_millis(self.llm_ms)
    }

    /// LLM heartbeat timeout.
    #[must_use]
    pub fn llm_heartbeat(&self) -> Duration {
        Duration::from_millis(self.llm_heartbeat_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("lookup_ms", self.lookup_ms),
            ("page_count_ms", self.page_count_ms),
            ("ocr_page_ms", self.ocr_page_ms),
            ("translation_ms", self.translation_ms),
            ("render_ms", self.render_ms),
            ("normalize_ms", self.normalize_ms),
            ("noise_removal_ms", self.noise_removal_ms),
            ("llm_ms", self.llm_ms),
            ("llm_heartbeat_ms", self.llm_heartbeat_ms),
        ];
        if let Some((name, _)) = all.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("timeouts.{name} must be > 0")));
        }
        if self.llm_heartbeat_ms > self.llm_ms {
            return Err(ConfigError::Invalid(
                "timeouts.llm_heartbeat_ms must not exceed timeouts.llm_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration passed into the job service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remote collaborator settings.
    #[serde(default)]
    pub services: ServiceSettings,
    /// Per-call timeouts.
    #[serde(default)]
    pub timeouts: CallTimeouts,
    /// Retry policies per operation class.
    #[serde(default)]
    pub retry: RetryPolicies,
    /// How long a job waits for a product URL before moving on.
    #[serde(default = "default_suspension_timeout_ms")]
    pub suspension_timeout_ms: u64,
    /// Bound on concurrent page OCR calls; `None` is unbounded.
    #[serde(default)]
    pub max_concurrent_pages: Option<usize>,
    /// Skip the LLM correction sub-stage of cleanup.
    #[serde(default)]
    pub skip_llm_correction: bool,
    /// Source language used when a request names none.
    #[serde(default = "default_source_lang")]
    pub default_source_lang: String,
    /// Target language used when a request names none.
    #[serde(default = "default_target_lang")]
    pub default_target_lang: String,
    /// Root under which default output directories are created.
    #[serde(default = "default_output_root")]
    pub output_root: String,
}

fn default_suspension_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_source_lang() -> String {
    "ja".to_string()
}

fn default_target_lang() -> String {
    "en".to_string()
}

fn default_output_root() -> String {
    "manuals".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            services: ServiceSettings::default(),
            timeouts: CallTimeouts::default(),
            retry: RetryPolicies::default(),
            suspension_timeout_ms: default_suspension_timeout_ms(),
            max_concurrent_pages: None,
            skip_llm_correction: false,
            default_source_lang: default_source_lang(),
            default_target_lang: default_target_lang(),
            output_root: default_output_root(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Sets the suspension timeout.
    #[must_use]
    pub fn with_suspension_timeout(mut self, timeout: Duration) -> Self {
        self.suspension_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the page concurrency bound.
    #[must_use]
    pub fn with_max_concurrent_pages(mut self, limit: usize) -> Self {
        self.max_concurrent_pages = Some(limit);
        self
    }

    /// Sets whether the LLM correction sub-stage runs.
    #[must_use]
    pub fn with_skip_llm_correction(mut self, skip: bool) -> Self {
        self.skip_llm_correction = skip;
        self
    }

    /// Suspension timeout as a duration.
    #[must_use]
    pub fn suspension_timeout(&self) -> Duration {
        Duration::from_millis(self.suspension_timeout_ms)
    }

    /// Default output directory for a manual.
    #[must_use]
    pub fn default_output_dir(&self, manual_name: &str) -> String {
        format!("{}/{manual_name}", self.output_root.trim_end_matches('/'))
    }

    /// Checks every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate().map_err(ConfigError::Invalid)?;
        self.timeouts.validate()?;
        if self.suspension_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "suspension_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.max_concurrent_pages == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_pages must be at least 1 when set".to_string(),
            ));
        }
        if self.default_source_lang.is_empty() || self.default_target_lang.is_empty() {
            return Err(ConfigError::Invalid(
                "default languages must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.suspension_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.timeouts.ocr_page(), Duration::from_secs(120));
        assert_eq!(config.timeouts.llm_heartbeat(), Duration::from_secs(120));
        assert_eq!(config.services.location, "us");
        assert_eq!(config.max_concurrent_pages, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PipelineConfig::from_json_str(
            r#"{"services": {"project_id": "p1", "processor_id": "ocr-1"},
                "timeouts": {"translation_ms": 1000},
                "max_concurrent_pages": 4}"#,
        )
        .unwrap();
        assert_eq!(config.services.project_id, "p1");
        assert_eq!(config.services.location, "us");
        assert_eq!(config.timeouts.translation_ms, 1000);
        assert_eq!(config.timeouts.render_ms, 600_000);
        assert_eq!(config.max_concurrent_pages, Some(4));
        assert_eq!(config.default_source_lang, "ja");
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"max_concurrent_pages": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"timeouts": {"llm_ms": 1000, "llm_heartbeat_ms": 5000}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"suspension_timeout_ms": 5000}}"#).unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.suspension_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_output_dir() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.default_output_dir("TR-808"), "manuals/TR-808");
        config.output_root = "/srv/out/".to_string();
        assert_eq!(config.default_output_dir("TR-808"), "/srv/out/TR-808");
    }
}
