// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health supervision: on-demand metric ingestion plus a periodic tick
//! that enforces session-wide limits.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::agent::{sleep_or_stop, Agent, AgentCore};
use crate::config::Config;
use crate::event::{AgentEvent, EventBus, HealthReason, HealthReasonKind};
use crate::metrics::AgentMetrics;

/// Cadence of the periodic progress check.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// A single response slower than this raises a warning.
const SLOW_RESPONSE_THRESHOLD_MS: f64 = 10_000.0;

/// RSS above this raises a warning; above the hard limit, a critical.
const MEMORY_WARN_MB: f64 = 45.0;
const MEMORY_LIMIT_MB: f64 = 50.0;

/// Ingestion handle the orchestrator records through. Cloneable; all
/// clones share one metrics store.
#[derive(Clone)]
pub struct HealthRecorder {
    metrics: Arc<Mutex<AgentMetrics>>,
    bus: EventBus,
    gc_interval: u32,
    since_sample: Arc<AtomicU32>,
}

impl HealthRecorder {
    /// Record one request outcome, sampling memory every `gc_interval`
    /// ingestions. Rust has no collector to hint, so the cadence drives
    /// the memory sample alone.
    pub fn record_request(&self, success: bool, elapsed_ms: f64) {
        let mut metrics = self.metrics.lock();
        metrics.record_request(success, elapsed_ms);

        let ingested = self.since_sample.fetch_add(1, Ordering::Relaxed) + 1;
        if ingested >= self.gc_interval {
            self.since_sample.store(0, Ordering::Relaxed);
            metrics.update_memory();
            if metrics.peak_memory_mb > MEMORY_WARN_MB {
                let mb = metrics.peak_memory_mb;
                self.bus.emit(
                    "health",
                    "orchestrator",
                    AgentEvent::HealthWarning(HealthReason::new(
                        HealthReasonKind::HighMemory,
                        format!("{mb:.1} MB resident"),
                    )),
                );
            }
        }
        drop(metrics);

        if elapsed_ms > SLOW_RESPONSE_THRESHOLD_MS {
            self.bus.emit(
                "health",
                "orchestrator",
                AgentEvent::HealthWarning(HealthReason::new(
                    HealthReasonKind::SlowResponse,
                    format!("{elapsed_ms:.0} ms"),
                )),
            );
        }
    }

    pub fn record_detection(&self) {
        self.metrics.lock().record_detection();
    }

    pub fn record_notification(&self) {
        self.metrics.lock().record_notification();
    }

    /// Copy of the current metrics.
    pub fn snapshot(&self) -> AgentMetrics {
        self.metrics.lock().clone()
    }
}

/// Always-on supervisor task. Owns the periodic tick; ingestion happens
/// through [`HealthRecorder`] clones handed to the orchestrator.
pub struct HealthAgent {
    core: AgentCore,
    recorder: HealthRecorder,
    max_session_duration: Duration,
    started_at: Instant,
}

impl HealthAgent {
    pub fn new(config: &Config, bus: EventBus) -> (Self, HealthRecorder) {
        let recorder = HealthRecorder {
            metrics: Arc::new(Mutex::new(AgentMetrics::new())),
            bus: bus.clone(),
            gc_interval: config.gc_interval.max(1),
            since_sample: Arc::new(AtomicU32::new(0)),
        };
        let agent = Self {
            core: AgentCore::new("health", bus),
            recorder: recorder.clone(),
            max_session_duration: config.max_session_duration(),
            started_at: Instant::now(),
        };
        (agent, recorder)
    }

    fn check(&self) {
        let elapsed = self.started_at.elapsed();
        let mut metrics = self.recorder.metrics.lock();
        metrics.update_memory();
        let peak_mb = metrics.peak_memory_mb;
        let requests = metrics.total_requests;
        drop(metrics);

        tracing::info!(
            elapsed_min = format!("{:.1}", elapsed.as_secs_f64() / 60.0),
            requests,
            peak_mb = format!("{peak_mb:.1}"),
            "health check"
        );

        if elapsed > self.max_session_duration {
            self.core.emit(
                "orchestrator",
                AgentEvent::HealthCritical(HealthReason::new(
                    HealthReasonKind::SessionTimeout,
                    format!("{:.0}s elapsed", elapsed.as_secs_f64()),
                )),
            );
            return;
        }
        if peak_mb > MEMORY_LIMIT_MB {
            self.core.emit(
                "orchestrator",
                AgentEvent::HealthCritical(HealthReason::new(
                    HealthReasonKind::MemoryLimit,
                    format!("{peak_mb:.1} MB resident"),
                )),
            );
        }
    }
}

impl Agent for HealthAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn setup(&mut self) -> anyhow::Result<()> {
        self.started_at = Instant::now();
        tracing::info!(limit_mb = MEMORY_LIMIT_MB, "health agent ready");
        Ok(())
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let stop = self.core.stop.clone();
        loop {
            if sleep_or_stop(&stop, TICK_INTERVAL).await {
                break;
            }
            self.check();
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        let metrics = self.recorder.snapshot();
        tracing::info!(
            requests = metrics.total_requests,
            detections = metrics.seats_detected,
            notifications = metrics.notifications_sent,
            "health agent done"
        );
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
