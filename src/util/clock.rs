//! Rate limiting for polled work.

use std::time::{Duration, Instant};

/// Allows an action at most once per `interval`.
#[derive(Debug, Clone)]
pub struct PollThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl PollThrottle {
    /// Create a throttle; the first call to [`Self::ready`] always passes.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Minimum spacing between passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true and restarts the window if `interval` has elapsed since
    /// the last pass.
    pub fn ready(&mut self, now: Instant) -> bool {
        if self
            .last
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}
