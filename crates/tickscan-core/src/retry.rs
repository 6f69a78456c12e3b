//! Bounded retry with a short fixed or jittered delay.

use std::time::Duration;

/// Hard ceiling on retries per upstream call; there are no unbounded loops.
pub const MAX_RETRIES_CAP: u32 = 2;

/// Delay strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed {
        delay: Duration,
    },
    /// Base delay plus a uniformly random extra in `0..=jitter`.
    Jittered {
        base: Duration,
        jitter: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Jittered {
            base: Duration::from_millis(400),
            jitter: Duration::from_millis(200),
        }
    }
}

impl Backoff {
    /// Delay before the next retry. Every retry waits the same base; only
    /// the jitter varies.
    pub fn delay(self) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Jittered { base, jitter } => {
                let jitter_ms = jitter.as_millis().min(u128::from(u64::MAX)) as u64;
                base + Duration::from_millis(fastrand::u64(0..=jitter_ms))
            }
        }
    }
}

/// Configuration for the per-call retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Backoff::default(),
            timeout: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// Retry configuration with a fixed delay; `max_retries` is capped.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES_CAP),
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// Single attempt, no retry.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts including the first, never above `MAX_RETRIES_CAP + 1`.
    pub fn attempts(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES_CAP) + 1
    }

    pub fn retry_delay(&self) -> Duration {
        self.backoff.delay()
    }
}
