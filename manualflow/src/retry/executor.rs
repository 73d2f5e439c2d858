//! Executes remote calls under a retry policy.
//!
//! Each attempt runs under its own start-to-close timeout. Calls whose
//! [`CallSpec`] carries a heartbeat timeout are supervised: a beat is emitted
//! immediately before and after the call, and an attempt that stays silent
//! for longer than the heartbeat timeout fails with
//! [`ServiceErrorKind::HeartbeatTimeout`](crate::errors::ServiceErrorKind).

use super::heartbeat::Heartbeat;
use super::policy::{OperationClass, RetryPolicies, RetryPolicy};
use crate::cancellation::CancellationToken;
use crate::errors::ServiceError;
use crate::events::EventSink;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Describes one remote call: its name, class and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// Operation name used in logs and events.
    pub operation: String,
    /// Class selecting the retry policy.
    pub class: OperationClass,
    /// Start-to-close timeout for a single attempt.
    pub timeout: Duration,
    /// Maximum silence between heartbeats, for supervised calls.
    pub heartbeat_timeout: Option<Duration>,
}

impl CallSpec {
    /// Creates an unsupervised call spec.
    #[must_use]
    pub fn new(operation: impl Into<String>, class: OperationClass, timeout: Duration) -> Self {
        Self {
            operation: operation.into(),
            class,
            timeout,
            heartbeat_timeout: None,
        }
    }

    /// Enables heartbeat supervision.
    #[must_use]
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }
}

/// Runs operations under the policy matching their [`OperationClass`].
///
/// Cloning is cheap; page tasks each hold a clone.
#[derive(Clone)]
pub struct RetryExecutor {
    policies: Arc<RetryPolicies>,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
    job_id: Arc<str>,
}

impl RetryExecutor {
    /// Creates an executor bound to one job's cancellation token.
    #[must_use]
    pub fn new(
        job_id: &str,
        policies: RetryPolicies,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            policies: Arc::new(policies),
            events,
            cancel,
            job_id: Arc::from(job_id),
        }
    }

    /// Returns the policy applied to a class.
    #[must_use]
    pub fn policy_for(&self, class: OperationClass) -> &RetryPolicy {
        self.policies.for_class(class)
    }

    /// Returns the event sink calls report to.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Returns the job-scoped cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Invokes `operation` until it succeeds, fails with a non-retryable
    /// error, or exhausts the policy's attempts.
    ///
    /// Exhaustion returns the final attempt's error; it is a normal outcome,
    /// not a panic or a separate error type.
    pub async fn invoke<T, F, Fut>(&self, spec: &CallSpec, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut(Heartbeat) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let policy = self.policy_for(spec.class).clone();
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled_error(spec));
            }

            let error = match self.attempt_once(spec, &mut operation).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt + 1 >= policy.maximum_attempts {
                warn!(
                    job_id = %self.job_id,
                    operation = %spec.operation,
                    attempts = attempt + 1,
                    error = %error,
                    "Retries exhausted"
                );
                self.events.try_emit(
                    "call.exhausted",
                    Some(json!({
                        "job_id": &*self.job_id,
                        "operation": spec.operation,
                        "class": spec.class,
                        "attempts": attempt + 1,
                        "error": error.to_string(),
                    })),
                );
                return Err(error);
            }

            let delay = policy.jittered(policy.delay_for(attempt));
            debug!(
                job_id = %self.job_id,
                operation = %spec.operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            self.events.try_emit(
                "call.retry",
                Some(json!({
                    "job_id": &*self.job_id,
                    "operation": spec.operation,
                    "class": spec.class,
                    "attempt": attempt + 1,
                    "delay_ms": delay.as_millis() as u64,
                    "error": error.to_string(),
                })),
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.cancel.cancelled() => return Err(self.cancelled_error(spec)),
            }
            attempt += 1;
        }
    }

    async fn attempt_once<T, F, Fut>(&self, spec: &CallSpec, operation: &mut F) -> Result<T, ServiceError>
    where
        F: FnMut(Heartbeat) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let (heartbeat, mut monitor) = Heartbeat::new(&spec.operation);
        let supervised = spec.heartbeat_timeout.is_some();
        let heartbeat_timeout = spec.heartbeat_timeout.unwrap_or(spec.timeout);

        if supervised {
            self.beat(&heartbeat, "before");
        }

        let call = tokio::time::timeout(spec.timeout, operation(heartbeat.clone()));
        tokio::pin!(call);

        let outcome = loop {
            tokio::select! {
                result = &mut call => {
                    break result.unwrap_or_else(|_| {
                        Err(ServiceError::timeout(format!(
                            "{} exceeded {}ms",
                            spec.operation,
                            spec.timeout.as_millis()
                        )))
                    });
                }
                () = self.cancel.cancelled() => break Err(self.cancelled_error(spec)),
                alive = monitor.wait_beat(heartbeat_timeout), if supervised => {
                    if !alive {
                        break Err(ServiceError::heartbeat_timeout(format!(
                            "{} sent no heartbeat for {}ms",
                            spec.operation,
                            heartbeat_timeout.as_millis()
                        )));
                    }
                }
            }
        };

        if supervised {
            self.beat(&heartbeat, "after");
        }
        outcome
    }

    fn beat(&self, heartbeat: &Heartbeat, moment: &str) {
        heartbeat.beat();
        self.events.try_emit(
            "call.heartbeat",
            Some(json!({
                "job_id": &*self.job_id,
                "operation": heartbeat.operation(),
                "moment": moment,
            })),
        );
    }

    fn cancelled_error(&self, spec: &CallSpec) -> ServiceError {
        let reason = self.cancel.reason().unwrap_or_else(|| "job cancelled".to_string());
        ServiceError::cancelled(format!("{}: {reason}", spec.operation))
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("job_id", &self.job_id)
            .field("policies", &self.policies)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceErrorKind;
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn executor() -> RetryExecutor {
        RetryExecutor::new(
            "job-1",
            RetryPolicies::default(),
            Arc::new(NoOpEventSink),
            Arc::new(CancellationToken::new()),
        )
    }

    fn remote(operation: &str) -> CallSpec {
        CallSpec::new(operation, OperationClass::RemoteApi, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicUsize::new(0);
        let result = executor()
            .invoke(&remote("lookup"), |_hb| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>(42) }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_api_backoff_sequence() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let recorder = started.clone();

        let result: Result<(), _> = executor()
            .invoke(&remote("ocr_page"), move |_hb| {
                recorder.lock().push(Instant::now());
                async { Err(ServiceError::transient("503")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::Transient);
        let started = started.lock();
        assert_eq!(started.len(), 5);
        let waits: Vec<u64> = started
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(waits, vec![2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = executor()
            .invoke(&remote("translate"), |_hb| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ServiceError::transient("retry me"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = executor()
            .invoke(&remote("render"), |_hb| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::permanent("bad document")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::Permanent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retried_then_returned() {
        let calls = AtomicUsize::new(0);
        let spec = CallSpec::new("page_count", OperationClass::Quick, Duration::from_secs(60));
        let result: Result<(), _> = executor()
            .invoke(&spec, |_hb| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_llm_call_hits_heartbeat_timeout() {
        let events = Arc::new(CollectingEventSink::new());
        let executor = RetryExecutor::new(
            "job-1",
            RetryPolicies::default(),
            events.clone(),
            Arc::new(CancellationToken::new()),
        );
        let spec = CallSpec::new("llm_correct", OperationClass::Llm, Duration::from_secs(300))
            .with_heartbeat_timeout(Duration::from_secs(120));

        let result: Result<(), _> = executor
            .invoke(&spec, |_hb| async {
                tokio::time::sleep(Duration::from_secs(200)).await;
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::HeartbeatTimeout);
        // before + after on each of the three attempts
        assert_eq!(events.count("call.heartbeat"), 6);
        assert_eq!(events.count("call.retry"), 2);
        assert_eq!(events.count("call.exhausted"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_beating_llm_call_survives_past_heartbeat_timeout() {
        let spec = CallSpec::new("llm_correct", OperationClass::Llm, Duration::from_secs(300))
            .with_heartbeat_timeout(Duration::from_secs(120));

        let result = executor()
            .invoke(&spec, |hb| async move {
                for _ in 0..4 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    hb.beat();
                }
                Ok::<_, ServiceError>(7)
            })
            .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let cancel = Arc::new(CancellationToken::new());
        let executor = RetryExecutor::new(
            "job-1",
            RetryPolicies::default(),
            Arc::new(NoOpEventSink),
            cancel.clone(),
        );

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel("operator abort");
            })
        };

        let started = Instant::now();
        let result: Result<(), _> = executor
            .invoke(&remote("ocr_page"), |_hb| async {
                Err(ServiceError::transient("503"))
            })
            .await;
        canceller.await.unwrap();

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.message.contains("operator abort"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
