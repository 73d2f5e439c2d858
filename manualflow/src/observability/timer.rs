//! Wall-clock timing of phases.

use crate::core::Phase;
use std::time::Instant;

/// Measures how long one phase takes.
#[derive(Debug)]
pub struct PhaseTimer {
    start: Instant,
    phase: Phase,
}

impl PhaseTimer {
    /// Starts timing a phase.
    #[must_use]
    pub fn start(phase: Phase) -> Self {
        Self {
            start: Instant::now(),
            phase,
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns the timed phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Finishes timing and returns the duration in milliseconds.
    #[must_use]
    pub fn finish(self) -> u64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_timer() {
        let timer = PhaseTimer::start(Phase::Ocr);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.phase(), Phase::Ocr);
        assert!(timer.finish() >= 10);
    }
}
