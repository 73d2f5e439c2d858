//! Human-in-the-loop product URL signal.
//!
//! A [`UrlSignal`] is created when a job starts, so a URL delivered before
//! the orchestrator reaches its wait point is captured rather than lost. The
//! wait races the signal against a timeout and the job's cancellation token;
//! exactly one of them resumes the job.

use crate::cancellation::CancellationToken;
use crate::errors::SignalError;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// How a suspension ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspensionOutcome {
    /// An operator supplied a URL; empty means "skip".
    Signalled(String),
    /// No signal arrived in time.
    TimedOut,
    /// The job was cancelled while waiting.
    Cancelled,
}

impl SuspensionOutcome {
    /// The URL the job continues with.
    #[must_use]
    pub fn resolved_url(&self) -> &str {
        match self {
            Self::Signalled(url) => url,
            Self::TimedOut | Self::Cancelled => "",
        }
    }
}

#[derive(Debug)]
enum SignalState {
    Open { pending: Option<String> },
    Resumed,
    Closed,
}

/// One-shot signal carrying an operator-supplied product URL.
#[derive(Debug)]
pub struct UrlSignal {
    job_id: String,
    state: Mutex<SignalState>,
    notify: Notify,
}

impl UrlSignal {
    /// Creates an open signal for a job.
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: Mutex::new(SignalState::Open { pending: None }),
            notify: Notify::new(),
        }
    }

    /// Delivers a URL.
    ///
    /// Accepted while the signal is open, including before anyone waits.
    pub fn deliver(&self, url: impl Into<String>) -> Result<(), SignalError> {
        let mut state = self.state.lock();
        match &mut *state {
            SignalState::Open { pending: Some(_) } => {
                Err(SignalError::AlreadyDelivered(self.job_id.clone()))
            }
            SignalState::Open { pending } => {
                *pending = Some(url.into());
                self.notify.notify_one();
                Ok(())
            }
            SignalState::Resumed => Err(SignalError::AlreadyResumed(self.job_id.clone())),
            SignalState::Closed => Err(SignalError::NotAwaitingInput(self.job_id.clone())),
        }
    }

    /// Closes the signal without a suspension; later deliveries are rejected.
    ///
    /// Used when the product URL was resolved without operator input.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SignalState::Open { .. }) {
            *state = SignalState::Closed;
        }
    }

    /// Returns true once the signal no longer accepts deliveries.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.state.lock(), SignalState::Open { .. })
    }

    /// Waits for a delivery, the timeout, or cancellation.
    ///
    /// Whichever comes first performs the single resume transition; a
    /// delivery racing the timeout wins if it landed before the transition.
    pub async fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> SuspensionOutcome {
        if let Some(url) = self.take_pending() {
            return SuspensionOutcome::Signalled(url);
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            let notified = self.notify.notified();
            if let Some(url) = self.take_pending() {
                return SuspensionOutcome::Signalled(url);
            }
            tokio::select! {
                () = notified => {}
                () = &mut deadline => return self.finish(SuspensionOutcome::TimedOut),
                () = cancel.cancelled() => return self.finish(SuspensionOutcome::Cancelled),
            }
        }
    }

    fn take_pending(&self) -> Option<String> {
        let mut state = self.state.lock();
        match &mut *state {
            SignalState::Open { pending } => {
                let url = pending.take()?;
                *state = SignalState::Resumed;
                Some(url)
            }
            SignalState::Resumed | SignalState::Closed => None,
        }
    }

    fn finish(&self, fallback: SuspensionOutcome) -> SuspensionOutcome {
        let mut state = self.state.lock();
        let outcome = match &mut *state {
            SignalState::Open { pending } => match pending.take() {
                Some(url) => SuspensionOutcome::Signalled(url),
                None => fallback,
            },
            SignalState::Resumed | SignalState::Closed => fallback,
        };
        *state = SignalState::Resumed;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

    #[tokio::test]
    async fn test_signal_before_wait_is_not_lost() {
        let signal = UrlSignal::new("job-1");
        signal.deliver("https://example.com/tr-808").unwrap();

        let outcome = signal.wait(THIRTY_MINUTES, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            SuspensionOutcome::Signalled("https://example.com/tr-808".to_string())
        );
        assert!(signal.is_resolved());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_during_wait() {
        let signal = Arc::new(UrlSignal::new("job-1"));
        let sender = {
            let signal = signal.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                signal.deliver("").unwrap();
            })
        };

        let outcome = signal.wait(THIRTY_MINUTES, &CancellationToken::new()).await;
        sender.await.unwrap();
        assert_eq!(outcome, SuspensionOutcome::Signalled(String::new()));
        assert_eq!(outcome.resolved_url(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resumes_once() {
        let signal = UrlSignal::new("job-1");
        let started = tokio::time::Instant::now();
        let outcome = signal.wait(THIRTY_MINUTES, &CancellationToken::new()).await;

        assert_eq!(outcome, SuspensionOutcome::TimedOut);
        assert!(started.elapsed() >= THIRTY_MINUTES);
        assert_eq!(
            signal.deliver("late"),
            Err(SignalError::AlreadyResumed("job-1".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let signal = UrlSignal::new("job-1");
        let cancel = Arc::new(CancellationToken::new());
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel("operator abort");
            })
        };

        let outcome = signal.wait(THIRTY_MINUTES, &cancel).await;
        canceller.await.unwrap();
        assert_eq!(outcome, SuspensionOutcome::Cancelled);
    }

    #[test]
    fn test_second_delivery_rejected() {
        let signal = UrlSignal::new("job-1");
        signal.deliver("a").unwrap();
        assert_eq!(
            signal.deliver("b"),
            Err(SignalError::AlreadyDelivered("job-1".to_string()))
        );
    }

    #[test]
    fn test_closed_signal_rejects_delivery() {
        let signal = UrlSignal::new("job-1");
        signal.close();
        assert!(signal.is_resolved());
        assert_eq!(
            signal.deliver("a"),
            Err(SignalError::NotAwaitingInput("job-1".to_string()))
        );
    }
}
