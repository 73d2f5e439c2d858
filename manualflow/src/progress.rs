//! Progress tracking for running jobs.
//!
//! The orchestrator publishes into a [`ProgressTracker`]; observers read
//! copies. The lock is held only for the copy or the update closure, never
//! across an await, so a query never waits on a remote call.

use crate::core::{JobStatus, Phase, ProgressSnapshot};
use chrono::Utc;
use parking_lot::RwLock;

/// Shared, non-blocking view of one job's progress.
#[derive(Debug)]
pub struct ProgressTracker {
    snapshot: RwLock<ProgressSnapshot>,
}

impl ProgressTracker {
    /// Creates a tracker for a manual.
    #[must_use]
    pub fn new(manual_name: &str) -> Self {
        Self::from_snapshot(ProgressSnapshot::new(manual_name))
    }

    /// Creates a tracker seeded with a stored snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: ProgressSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.read().clone()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.snapshot.read().phase
    }

    /// Applies an update and stamps the snapshot.
    ///
    /// The phase never moves backwards: an update that would regress it is
    /// clamped to the previously reported phase.
    pub fn update(&self, apply: impl FnOnce(&mut ProgressSnapshot)) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.write();
        let reported = snapshot.phase;
        apply(&mut snapshot);
        if snapshot.phase < reported {
            snapshot.phase = reported;
        }
        snapshot.updated_at = Utc::now();
        snapshot.clone()
    }

    /// Moves to a later phase and marks the job running.
    pub fn enter_phase(&self, phase: Phase) -> ProgressSnapshot {
        self.update(|s| {
            s.phase = phase;
            if !s.status.is_terminal() {
                s.status = JobStatus::Running;
            }
        })
    }
}
