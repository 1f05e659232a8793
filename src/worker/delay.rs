//! Per-task randomized delay source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::config::DelayRange;

/// Draws delays uniformly from a [`DelayRange`] with a generator owned by one task
#[derive(Debug, Clone)]
pub struct DelaySampler {
    range: DelayRange,
    rng: StdRng,
}

impl DelaySampler {
    /// Sampler seeded from the operating system's entropy source
    pub fn new(range: DelayRange) -> Self {
        Self {
            range,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sampler for reproducible runs
    pub fn seeded(range: DelayRange, seed: u64) -> Self {
        Self {
            range,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next delay in `[min, max)`, or exactly `min` for a fixed range
    pub fn next_delay(&mut self) -> Duration {
        if self.range.min_ms >= self.range.max_ms {
            return self.range.min();
        }
        Duration::from_millis(self.rng.random_range(self.range.min_ms..self.range.max_ms))
    }
}
