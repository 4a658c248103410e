// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff for retry scheduling.

use rand::Rng;

/// Backoff parameters, taken from `[ingest]` config.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the second attempt, in milliseconds.
    pub base_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub cap_ms: u64,
}

impl BackoffPolicy {
    /// Deterministic delay for the given attempt number (1-based: the delay
    /// scheduled *after* attempt `attempts` failed).
    ///
    /// Doubles per attempt and saturates at the cap, so attempt counts past
    /// 63 cannot overflow.
    pub fn delay_ms(&self, attempts: u32) -> u64 {
        let shift = attempts.saturating_sub(1).min(63);
        let delay = self.base_ms.saturating_mul(1u64.checked_shl(shift).unwrap_or(u64::MAX));
        delay.min(self.cap_ms)
    }

    /// Delay with up to 10% additive jitter, still capped.
    ///
    /// Jitter spreads out retries of jobs that failed together, so a burst
    /// of transient failures does not come back as a burst of retries.
    pub fn jittered_delay_ms(&self, attempts: u32) -> u64 {
        let delay = self.delay_ms(attempts);
        let jitter_max = delay / 10;
        if jitter_max == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_max);
        delay.saturating_add(jitter).min(self.cap_ms)
    }
}
