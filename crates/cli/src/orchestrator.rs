// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session orchestration: owns the agents and the event bus, routes
//! events, and shuts the pipeline down deterministically.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{drive, Agent};
use crate::client::{SeatQueryClient, SeatSource};
use crate::config::Config;
use crate::event::{AgentEvent, AgentMessage, EventBus};
use crate::health::{HealthAgent, HealthRecorder};
use crate::metrics::AgentMetrics;
use crate::monitor::MonitorAgent;
use crate::notifier::NotifierAgent;
use crate::query::{CheckResult, Query};

/// Bound on the shutdown drain; tasks still running after this are aborted.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the event loop blocks on the bus before re-checking liveness.
const BUS_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Session lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Cloneable handle for requesting a graceful stop from outside the
/// session task (signal handlers, front-ends). Idempotent.
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Owns the four agents and the bus receiver for one session. A session is
/// one call to [`run`](Orchestrator::run); the instance is consumed by it.
pub struct Orchestrator<S> {
    state: SessionState,
    bus: EventBus,
    bus_rx: Option<mpsc::UnboundedReceiver<AgentMessage>>,
    session_stop: CancellationToken,
    agent_stops: Vec<CancellationToken>,
    recorder: HealthRecorder,
    notifier_tx: mpsc::Sender<CheckResult>,
    monitor: Option<MonitorAgent<S>>,
    notifier: Option<NotifierAgent>,
    health: Option<HealthAgent>,
}

impl Orchestrator<SeatQueryClient> {
    /// Production wiring: a real HTTP client behind the monitor.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = SeatQueryClient::new(config)?;
        Self::with_source(config, client)
    }
}

impl<S: SeatSource + 'static> Orchestrator<S> {
    /// Wire the pipeline around an arbitrary seat source.
    pub fn with_source(config: &Config, source: S) -> anyhow::Result<Self> {
        let (bus, bus_rx) = EventBus::channel();
        let monitor = MonitorAgent::new(config, bus.clone(), source);
        let (notifier, notifier_tx) = NotifierAgent::new(config, bus.clone())?;
        let (health, recorder) = HealthAgent::new(config, bus.clone());

        let agent_stops =
            vec![monitor.core().stop.clone(), notifier.core().stop.clone(), health.core().stop.clone()];

        Ok(Self {
            state: SessionState::Idle,
            bus,
            bus_rx: Some(bus_rx),
            session_stop: CancellationToken::new(),
            agent_stops,
            recorder,
            notifier_tx,
            monitor: Some(monitor),
            notifier: Some(notifier),
            health: Some(health),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sender handle onto the session bus, for shells that publish
    /// `SessionStop` instead of calling [`stop_handle`](Self::stop_handle).
    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Handle for external graceful stop. Safe to call from any task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { cancel: self.session_stop.clone() }
    }

    /// Run the full pipeline to completion and return the final metrics.
    pub async fn run(mut self, query: Query) -> anyhow::Result<AgentMetrics> {
        self.state = SessionState::Running;
        let session_started = tokio::time::Instant::now();
        tracing::info!(query = query.summary(), "session starting");

        self.bus.emit("input", "orchestrator", AgentEvent::QueryReady(query.clone()));

        let mut monitor = self
            .monitor
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already consumed"))?;
        monitor.set_query(query);
        let notifier = self
            .notifier
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already consumed"))?;
        let health = self
            .health
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already consumed"))?;

        let mut monitor_task = tokio::spawn(drive(monitor));
        let mut notifier_task = tokio::spawn(drive(notifier));
        let mut health_task = tokio::spawn(drive(health));

        let mut bus_rx = self
            .bus_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already consumed"))?;

        // Central event loop. The monitor finishing is the normal
        // end-of-session path.
        let session_stop = self.session_stop.clone();
        while self.state == SessionState::Running {
            if monitor_task.is_finished() {
                tracing::info!("monitor exited; ending session");
                break;
            }
            tokio::select! {
                _ = session_stop.cancelled() => {
                    self.initiate_stop("external stop");
                }
                received = tokio::time::timeout(BUS_POLL_TIMEOUT, bus_rx.recv()) => {
                    match received {
                        Ok(Some(msg)) => self.dispatch(msg),
                        Ok(None) => break,
                        Err(_) => {} // poll timeout; re-check liveness
                    }
                }
            }
        }

        // Late events already on the bus still count before teardown.
        while let Ok(msg) = bus_rx.try_recv() {
            self.dispatch(msg);
        }

        // Shutdown: signal everything, then wait with a hard bound.
        self.state = SessionState::Stopping;
        for stop in &self.agent_stops {
            stop.cancel();
        }

        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            let _ = (&mut monitor_task).await;
            let _ = (&mut notifier_task).await;
            let _ = (&mut health_task).await;
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                timeout_s = SHUTDOWN_TIMEOUT.as_secs(),
                "agents did not drain in time; aborting"
            );
            monitor_task.abort();
            notifier_task.abort();
            health_task.abort();
        }

        // Record anything the agents emitted while draining.
        while let Ok(msg) = bus_rx.try_recv() {
            self.dispatch(msg);
        }

        self.state = SessionState::Stopped;
        let elapsed_min = session_started.elapsed().as_secs_f64() / 60.0;
        tracing::info!(elapsed_min = format!("{elapsed_min:.1}"), "session stopped");

        Ok(self.recorder.snapshot())
    }

    fn initiate_stop(&mut self, cause: &str) {
        if self.state != SessionState::Running {
            return;
        }
        tracing::info!(cause, "stopping session");
        self.state = SessionState::Stopping;
        for stop in &self.agent_stops {
            stop.cancel();
        }
    }

    /// Route one bus message. The match is exhaustive over the vocabulary.
    fn dispatch(&mut self, msg: AgentMessage) {
        tracing::debug!(event = msg.event.kind(), source = msg.source, "event received");

        match msg.event {
            AgentEvent::QueryReady(query) => {
                tracing::info!(query = query.summary(), "query accepted");
            }
            AgentEvent::PollStart { request_count } => {
                tracing::debug!(poll = request_count, "poll starting");
            }
            AgentEvent::PollResult { elapsed_ms, request_count, .. } => {
                self.recorder.record_request(true, elapsed_ms);
                tracing::debug!(poll = request_count, "poll recorded");
            }
            AgentEvent::SeatDetected(result) => {
                self.recorder.record_detection();
                if let Err(e) = self.notifier_tx.try_send(result) {
                    tracing::debug!(err = %e, "detection not queued for notification");
                }
            }
            AgentEvent::NotifyComplete { trains_count, notification_number } => {
                self.recorder.record_notification();
                tracing::info!(
                    trains = trains_count,
                    total = notification_number,
                    "notification complete"
                );
            }
            AgentEvent::HealthWarning(reason) => {
                tracing::warn!(reason = %reason, "health warning");
            }
            AgentEvent::HealthCritical(reason) => {
                tracing::error!(reason = %reason, "health critical");
                self.initiate_stop(reason.kind.as_str());
            }
            AgentEvent::SessionStop => {
                self.initiate_stop("session stop requested");
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
