//! Exponential backoff with a ceiling and a lifetime attempt budget.
//!
//! The attempt counter only grows when a reconnection is *scheduled* and
//! only resets when a connection is actually established. A manual
//! `connect()` that fails leaves it untouched, so the budget bounds the
//! automatic chain without limiting manual retries.

use std::time::Duration;

use crate::event::ReconnectScheduled;

/// Reconnection policy state.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts,
            attempt: 0,
        }
    }

    /// Delay for 1-based attempt `attempt`: `min(base * 2^(attempt-1), max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Count a new attempt and return its schedule, or `None` once the
    /// budget is spent.
    pub fn next_attempt(&mut self) -> Option<ReconnectScheduled> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(ReconnectScheduled {
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            delay: self.delay_for_attempt(self.attempt),
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called on every successful transition into Connected.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
