// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket gate on outbound requests.

use std::time::Duration;

use tokio::time::Instant;

/// Cooperative token bucket.
///
/// Tokens refill continuously at `rate` per second up to `burst`.
/// [`acquire`](TokenBucket::acquire) suspends until a whole token is
/// available, so the scheduler can never push requests out faster than the
/// bucket allows regardless of how short its computed intervals get.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst: f64::from(burst),
            tokens: f64::from(burst),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Take one token, suspending until one is available.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&mut self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            self.refill();
            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return waited;
            }
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(deficit / self.rate);
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Tokens currently available, after refill.
    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
