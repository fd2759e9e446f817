//! Per-resource error backoff
//!
//! Consecutive failures of the same DynamicNamespace double the requeue
//! delay, starting at the configured initial delay and capped at the
//! configured maximum. A successful pass resets the count.

use std::time::Duration;

use dashmap::DashMap;

use crate::crd::ResourceKey;

/// Exponential requeue delays tracked per resource
#[derive(Debug)]
pub struct ErrorBackoff {
    initial: Duration,
    max: Duration,
    failures: DashMap<ResourceKey, u32>,
}

impl ErrorBackoff {
    /// Create a backoff growing from `initial` up to `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            failures: DashMap::new(),
        }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&self, key: &ResourceKey) -> Duration {
        let mut failures = self.failures.entry(key.clone()).or_insert(0);
        let exponent = (*failures).min(31);
        *failures = failures.saturating_add(1);

        self.initial
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Forget the failures of a resource after a successful pass
    pub fn reset(&self, key: &ResourceKey) {
        self.failures.remove(key);
    }

    /// Delay used when a failure cannot be attributed to a resource
    pub fn initial(&self) -> Duration {
        self.initial
    }
}
