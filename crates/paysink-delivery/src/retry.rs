//! Retry policy and per-record delivery state machine.
//!
//! A delivery chain moves through
//!
//! ```text
//! Scheduled ──▶ Attempting ──┬──▶ Succeeded
//!                 ▲          ├──▶ Retrying { delay } ──(delay)──┐
//!                 │          └──▶ Exhausted                     │
//!                 └─────────────────────────────────────────────┘
//! ```
//!
//! The default policy allows 5 attempts with linear backoff, waiting
//! `attempts × 1 s` after each failure: 1 s, 2 s, 3 s and 4 s before
//! attempts 2 to 5.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy configuration for webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for the backoff calculation.
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Jitter fraction (0.0 to 1.0) applied symmetrically to each delay.
    pub jitter_factor: f64,

    /// Strategy for calculating backoff delays.
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.0,
            backoff_strategy: BackoffStrategy::Linear,
        }
    }
}

/// Strategy for calculating retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
    /// Delay grows by the base amount after each failed attempt.
    #[default]
    Linear,
}

/// Where a delivery chain stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Persisted and waiting for its first attempt.
    Scheduled,
    /// An HTTP attempt is in flight.
    Attempting {
        /// 1-based number of the attempt in flight.
        attempt: u32,
    },
    /// A 2xx response was received.
    Succeeded {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// The last attempt failed; another follows after `delay`.
    Retrying {
        /// Attempts made so far.
        attempts: u32,
        /// Wait before the next attempt.
        delay: Duration,
    },
    /// Every allowed attempt failed.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl RetryState {
    /// Whether no further attempts will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Delay before the next attempt, if one is due.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            Self::Retrying { delay, .. } => Some(*delay),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Attempting { .. } => "attempting",
            Self::Succeeded { .. } => "succeeded",
            Self::Retrying { .. } => "retrying",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

impl RetryPolicy {
    /// State after an attempt, given the total attempts made so far.
    pub fn decide(&self, attempts: u32, succeeded: bool) -> RetryState {
        if succeeded {
            RetryState::Succeeded { attempts }
        } else if attempts >= self.max_attempts {
            RetryState::Exhausted { attempts }
        } else {
            RetryState::Retrying { attempts, delay: self.delay_after(attempts) }
        }
    }

    /// State of a record loaded from storage, before any new attempt.
    pub fn resume(&self, attempts: u32, delivered: bool) -> RetryState {
        if delivered {
            RetryState::Succeeded { attempts }
        } else if attempts >= self.max_attempts {
            RetryState::Exhausted { attempts }
        } else if attempts == 0 {
            RetryState::Scheduled
        } else {
            RetryState::Attempting { attempt: attempts + 1 }
        }
    }

    /// Wait after the `attempts`-th failed attempt.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let attempts = attempts.max(1);

        let base = match self.backoff_strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempts),
            BackoffStrategy::Exponential => {
                let exponent = (attempts - 1).min(20);
                self.base_delay.saturating_mul(2_u32.saturating_pow(exponent))
            },
        };

        let capped = base.min(self.max_delay);
        apply_jitter(capped, self.jitter_factor).min(self.max_delay)
    }
}

/// Randomizes `duration` by ±`jitter_factor`.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 || duration.is_zero() {
        return duration;
    }

    let clamped = jitter_factor.clamp(0.0, 1.0);
    let range = duration.as_secs_f64() * clamped;
    let offset = rand::rng().random_range(-range..=range);

    Duration::from_secs_f64((duration.as_secs_f64() + offset).max(0.0))
}
