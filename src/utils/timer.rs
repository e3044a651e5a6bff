//! Stage timing

use std::time::{Duration, Instant};
use tracing::debug;

/// Measures one orchestration stage
#[derive(Debug)]
pub struct Timer {
    stage: &'static str,
    started: Instant,
}

impl Timer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log the stage duration and return it
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        debug!(
            stage = self.stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
        elapsed
    }
}
