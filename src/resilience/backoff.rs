//! Exponential backoff with jitter for retrying transient accept failures.

use std::time::Duration;

use rand::Rng;

/// First retry delay after a transient accept error.
pub const ACCEPT_BASE: Duration = Duration::from_millis(5);
/// Retry delays never exceed this.
pub const ACCEPT_MAX: Duration = Duration::from_secs(1);

/// Delay before retry number `attempt` (1-based); attempt 0 means no wait.
///
/// Doubles from `base` up to `max`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}

/// Retry state for one accept loop.
#[derive(Debug, Default)]
pub struct AcceptBackoff {
    attempt: u32,
}

impl AcceptBackoff {
    /// Record a failure and return how long to sleep before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        calculate_backoff(self.attempt, ACCEPT_BASE, ACCEPT_MAX)
    }

    /// Forget earlier failures after a successful accept.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
