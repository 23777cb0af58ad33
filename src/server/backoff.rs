//! Accept retry backoff
//!
//! Exponential delay applied between consecutive transient accept failures.

use std::time::Duration;

/// Delay before the first retry
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(5);

/// Upper bound for any single retry delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);

/// Backoff state for an accept loop.
///
/// The k-th consecutive failure waits `min(initial * 2^(k-1), max)`.
/// A successful accept calls [`reset`](AcceptBackoff::reset).
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    current: Option<Duration>,
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        AcceptBackoff::new(DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl AcceptBackoff {
    /// Create a backoff with explicit bounds
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        AcceptBackoff {
            initial_delay,
            max_delay,
            current: None,
        }
    }

    /// Record one more failure and return how long to sleep
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial_delay,
            Some(prev) => prev.saturating_mul(2),
        };
        let delay = delay.min(self.max_delay);
        self.current = Some(delay);
        delay
    }

    /// Forget previous failures
    pub fn reset(&mut self) {
        self.current = None;
    }
}
