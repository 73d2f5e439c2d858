//! Retry policies and backoff computation.
//!
//! A [`RetryPolicy`] is the (initial interval, maximum interval, maximum
//! attempts, backoff coefficient) tuple applied uniformly to one
//! [`OperationClass`] of remote call.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Class of remote operation, used to select a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Local or deterministic operations.
    Quick,
    /// Network calls to OCR, translation, lookup and render services.
    RemoteApi,
    /// Long-running LLM correction calls; supervised by heartbeats.
    Llm,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quick => write!(f, "quick"),
            Self::RemoteApi => write!(f, "remote_api"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Retry parameters for one class of remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub maximum_interval_ms: u64,
    /// Total attempts, including the first.
    pub maximum_attempts: u32,
    /// Multiplier applied per attempt.
    pub backoff_coefficient: f64,
    /// Jitter applied on top of the computed delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote_api()
    }
}

impl RetryPolicy {
    /// Policy for local/deterministic operations.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            initial_interval_ms: 1_000,
            maximum_interval_ms: 10_000,
            maximum_attempts: 3,
            backoff_coefficient: 2.0,
            jitter: JitterStrategy::None,
        }
    }

    /// Policy for network calls to remote services.
    #[must_use]
    pub fn remote_api() -> Self {
        Self {
            initial_interval_ms: 2_000,
            maximum_interval_ms: 30_000,
            maximum_attempts: 5,
            backoff_coefficient: 2.0,
            jitter: JitterStrategy::None,
        }
    }

    /// Policy for LLM correction calls.
    #[must_use]
    pub fn llm() -> Self {
        Self {
            initial_interval_ms: 5_000,
            maximum_interval_ms: 120_000,
            maximum_attempts: 3,
            backoff_coefficient: 2.0,
            jitter: JitterStrategy::None,
        }
    }

    /// Sets the initial interval.
    #[must_use]
    pub fn with_initial_interval_ms(mut self, delay: u64) -> Self {
        self.initial_interval_ms = delay;
        self
    }

    /// Sets the maximum interval.
    #[must_use]
    pub fn with_maximum_interval_ms(mut self, delay: u64) -> Self {
        self.maximum_interval_ms = delay;
        self
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    /// Sets the backoff coefficient.
    #[must_use]
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the initial interval.
    #[must_use]
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Returns the maximum interval.
    #[must_use]
    pub fn maximum_interval(&self) -> Duration {
        Duration::from_millis(self.maximum_interval_ms)
    }

    /// Delay after failed attempt `attempt` (0-indexed):
    /// `min(initial * coefficient^attempt, maximum)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_interval_ms as f64 * self.backoff_coefficient.powi(exponent);
        let cap = self.maximum_interval_ms as f64;
        let capped = if raw.is_finite() { raw.min(cap) } else { cap };
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// The full delay schedule, one entry per attempt.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.maximum_attempts).map(|k| self.delay_for(k)).collect()
    }

    /// Applies the jitter strategy to a computed delay.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        let jittered = match self.jitter {
            JitterStrategy::None => millis,
            JitterStrategy::Full => {
                if millis == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=millis)
                }
            }
            JitterStrategy::Equal => {
                let half = millis / 2;
                if half == 0 {
                    millis
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };
        Duration::from_millis(jittered)
    }

    /// Checks that the policy can drive at least one attempt.
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if self.maximum_attempts == 0 {
            return Err(format!("{name}: maximum_attempts must be at least 1"));
        }
        if self.backoff_coefficient < 1.0 || !self.backoff_coefficient.is_finite() {
            return Err(format!("{name}: backoff_coefficient must be >= 1.0"));
        }
        if self.initial_interval_ms > self.maximum_interval_ms {
            return Err(format!(
                "{name}: initial_interval_ms exceeds maximum_interval_ms"
            ));
        }
        Ok(())
    }
}

/// The three canonical policies, keyed by operation class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicies {
    /// Policy for [`OperationClass::Quick`].
    #[serde(default = "RetryPolicy::quick")]
    pub quick: RetryPolicy,
    /// Policy for [`OperationClass::RemoteApi`].
    #[serde(default = "RetryPolicy::remote_api")]
    pub remote_api: RetryPolicy,
    /// Policy for [`OperationClass::Llm`].
    #[serde(default = "RetryPolicy::llm")]
    pub llm: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            quick: RetryPolicy::quick(),
            remote_api: RetryPolicy::remote_api(),
            llm: RetryPolicy::llm(),
        }
    }
}

impl RetryPolicies {
    /// Returns the policy for an operation class.
    #[must_use]
    pub fn for_class(&self, class: OperationClass) -> &RetryPolicy {
        match class {
            OperationClass::Quick => &self.quick,
            OperationClass::RemoteApi => &self.remote_api,
            OperationClass::Llm => &self.llm,
        }
    }

    /// Validates all three policies.
    pub fn validate(&self) -> Result<(), String> {
        self.quick.validate("quick")?;
        self.remote_api.validate("remote_api")?;
        self.llm.validate("llm")
    }
}
