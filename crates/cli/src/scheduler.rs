// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive poll-interval computation.

use std::time::Duration;

use rand::Rng;

use crate::config::Config;

/// Computes the wait before the next poll.
///
/// Errors back off multiplicatively up to a ceiling; recovery walks back
/// down more slowly so the cadence does not oscillate at the floor. A
/// uniform jitter decorrelates this client from server-side bucketing.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    base_interval: f64,
    max_interval: f64,
    backoff_multiplier: f64,
    jitter_range: f64,
    current_interval: f64,
}

/// Divisor applied on success; recovery is slower than backoff.
const RECOVERY_DIVISOR: f64 = 1.2;

impl PollScheduler {
    pub fn new(base_interval: f64, max_interval: f64, backoff_multiplier: f64, jitter_range: f64) -> Self {
        Self {
            base_interval,
            max_interval,
            backoff_multiplier,
            jitter_range,
            current_interval: base_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.base_interval,
            config.max_interval,
            config.backoff_multiplier,
            config.jitter_range,
        )
    }

    /// The interval before jitter, in seconds.
    pub fn current_interval(&self) -> f64 {
        self.current_interval
    }

    /// Advance the interval for the outcome of the last poll and return
    /// the next wait, jitter included.
    pub fn next_interval(&mut self, had_error: bool) -> Duration {
        if had_error {
            self.current_interval =
                (self.current_interval * self.backoff_multiplier).min(self.max_interval);
        } else {
            self.current_interval = (self.current_interval / RECOVERY_DIVISOR).max(self.base_interval);
        }

        let jitter = if self.jitter_range > 0.0 {
            rand::rng().random_range(0.0..self.jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64(self.current_interval + jitter)
    }

    /// Snap back to the base interval.
    pub fn reset(&mut self) {
        self.current_interval = self.base_interval;
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
