//! Liveness heartbeats for long-running remote calls.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// Handle a remote call uses to report that it is still alive.
///
/// Cloning is cheap; every clone feeds the same monitor.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    tx: Arc<watch::Sender<u64>>,
    operation: Arc<str>,
}

impl Heartbeat {
    /// Creates a heartbeat handle and the monitor that observes it.
    #[must_use]
    pub fn new(operation: &str) -> (Self, HeartbeatMonitor) {
        let (tx, rx) = watch::channel(0);
        let heartbeat = Self {
            tx: Arc::new(tx),
            operation: Arc::from(operation),
        };
        (heartbeat, HeartbeatMonitor { rx })
    }

    /// Creates a handle nobody supervises.
    #[must_use]
    pub fn detached(operation: &str) -> Self {
        Self::new(operation).0
    }

    /// Records a beat.
    pub fn beat(&self) {
        self.tx.send_modify(|count| *count += 1);
        trace!(operation = %self.operation, beats = self.count(), "Heartbeat");
    }

    /// Returns the number of beats recorded so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Returns the supervised operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Observes beats from a [`Heartbeat`].
#[derive(Debug)]
pub struct HeartbeatMonitor {
    rx: watch::Receiver<u64>,
}

impl HeartbeatMonitor {
    /// Waits up to `timeout` for the next beat.
    ///
    /// Returns false when the window elapses without a beat.
    pub async fn wait_beat(&mut self, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, self.rx.changed()).await, Ok(Ok(())))
    }
}
