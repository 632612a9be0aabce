//! Reconnection backoff policy.
//!
//! [`BackoffPolicy`] maps a failed attempt count to the delay before the next
//! reconnection attempt: `base_delay * 2^attempt`, clamped to `max_delay`.
//! Attempt 0 yields `base_delay`, never zero: the first reconnect is never
//! instantaneous, which keeps a client from hammering a server that is still
//! cycling. The function is pure and has no side effects.

use std::time::Duration;

/// Shift amounts past this already exceed any realistic `max_delay`.
const MAX_SHIFT: u32 = 32;

/// Exponential backoff with a cap.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for every computed delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// Overflowing intermediate values clamp to `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(MAX_SHIFT);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(1u128 << shift);

        Duration::from_millis(delay_ms.min(self.max_delay.as_millis()) as u64)
    }
}
