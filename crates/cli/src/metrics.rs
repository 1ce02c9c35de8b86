// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-wide runtime metrics.

use std::collections::VecDeque;

use tokio::time::Instant;

/// Response-time samples kept for the running mean.
const RESPONSE_RING: usize = 100;

/// Counters and samples for one session, reported in the final summary.
#[derive(Debug, Clone)]
pub struct AgentMetrics {
    pub total_requests: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub seats_detected: u64,
    pub notifications_sent: u64,
    pub peak_memory_mb: f64,
    response_times: VecDeque<f64>,
    started_at: Instant,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            successful_checks: 0,
            failed_checks: 0,
            seats_detected: 0,
            notifications_sent: 0,
            peak_memory_mb: 0.0,
            response_times: VecDeque::with_capacity(RESPONSE_RING),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&mut self, success: bool, elapsed_ms: f64) {
        self.total_requests += 1;
        if success {
            self.successful_checks += 1;
        } else {
            self.failed_checks += 1;
        }
        if self.response_times.len() == RESPONSE_RING {
            self.response_times.pop_front();
        }
        self.response_times.push_back(elapsed_ms);
    }

    pub fn record_detection(&mut self) {
        self.seats_detected += 1;
    }

    pub fn record_notification(&mut self) {
        self.notifications_sent += 1;
    }

    /// Sample the process RSS and keep the peak.
    pub fn update_memory(&mut self) {
        let mb = rss_mb();
        if mb > self.peak_memory_mb {
            self.peak_memory_mb = mb;
        }
    }

    /// Mean over the retained response-time ring, in milliseconds.
    pub fn mean_response_ms(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
    }

    pub fn session_duration(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Human-readable end-of-session block.
    pub fn summary(&self) -> String {
        let minutes = self.session_duration().as_secs_f64() / 60.0;
        let success_rate =
            self.successful_checks as f64 / (self.total_requests.max(1)) as f64 * 100.0;
        format!(
            "=== session summary ===\n\
             \x20 elapsed: {minutes:.1} min\n\
             \x20 requests: {} ({success_rate:.1}% ok)\n\
             \x20 detections: {}\n\
             \x20 notifications: {}\n\
             \x20 mean response: {:.0} ms\n\
             \x20 peak memory: {:.1} MB",
            self.total_requests,
            self.seats_detected,
            self.notifications_sent,
            self.mean_response_ms(),
            self.peak_memory_mb,
        )
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident set size of this process in megabytes.
///
/// Reads `/proc/self/status`; returns 0.0 where that is unavailable.
pub fn rss_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
            return 0.0;
        };
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: f64 = rest
                    .trim()
                    .trim_end_matches("kB")
                    .trim()
                    .parse()
                    .unwrap_or(0.0);
                return kb / 1024.0;
            }
        }
        0.0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0.0
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
