//! Wall clock backed by tokio timers.

use std::time::{Duration, Instant};

use crate::ports::clock::{Clock, SleepFuture};

/// Monotonic clock measured from its creation.
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Start a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}
