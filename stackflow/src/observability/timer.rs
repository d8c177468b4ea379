//! Wall-clock timing of provisioning steps.

use std::time::{Duration, Instant};
use tracing::debug;

/// Measures one named step.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: &'static str,
}

impl SpanTimer {
    /// Starts timing.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Time since start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Logs the duration and returns it in milliseconds.
    pub fn finish(self) -> u64 {
        let elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(step = self.name, elapsed_ms, "Step finished");
        elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("render");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.name(), "render");
        assert!(timer.finish() >= 10);
    }
}
