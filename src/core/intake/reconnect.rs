//! Exponential backoff shared by both producers' reconnect/retry loops.

use std::time::Duration;

/// Doubles the prior delay on each call, capped at `max`. Callers hold the
/// returned delay as state between attempts; this type does nothing with
/// time itself.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to sleep for this attempt, then doubles it for next
    /// time (capped at `max`).
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
