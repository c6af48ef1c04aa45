//! Retry delay policy
//!
//! Each delay is the larger of two thirds of the previous delay and a fresh
//! uniform draw from `[min, max]`. The draw keeps concurrent retry sequences
//! from synchronizing; the two-thirds floor stops a long delay from collapsing
//! straight back to `min`.

use std::time::Duration;

use contracts::BackoffConfig;

/// Bounds for retry delays plus the per-destination retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    min: Duration,
    max: Duration,
    max_retries: u32,
}

impl BackoffPolicy {
    /// Create a policy; `max` is raised to `min` if given lower
    pub fn new(min: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            min,
            max: max.max(min),
            max_retries,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.min_backoff(), config.max_backoff(), config.max_retries)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay to use after `last`
    pub fn next(&self, last: Duration) -> Duration {
        self.next_with(last, rand::random::<f64>())
    }

    /// `next` with the uniform draw supplied; `unit` is clamped to `[0, 1]`
    pub fn next_with(&self, last: Duration, unit: f64) -> Duration {
        let floor = last * 2 / 3;
        let span = self.max - self.min;
        let drawn = self.min + span.mul_f64(unit.clamp(0.0, 1.0));
        floor.max(drawn)
    }

    /// State for a batch starting a new sequence against a destination
    pub fn fresh_state(&self) -> BackoffState {
        BackoffState {
            current_delay: self.min,
            retries_remaining: self.max_retries,
        }
    }

    /// State for a destination that keeps failing with nowhere to fail over to
    pub fn pinned_state(&self) -> BackoffState {
        BackoffState {
            current_delay: self.max,
            retries_remaining: self.max_retries,
        }
    }
}

/// Progress of one retry sequence against one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    /// Delay before the next retry
    pub current_delay: Duration,
    /// Retries left before failover
    pub retries_remaining: u32,
}

impl BackoffState {
    pub fn is_exhausted(&self) -> bool {
        self.retries_remaining == 0
    }

    /// State after one retry has been scheduled with `current_delay`
    pub fn advance(self, policy: &BackoffPolicy) -> Self {
        Self {
            current_delay: policy.next(self.current_delay),
            retries_remaining: self.retries_remaining.saturating_sub(1),
        }
    }
}
