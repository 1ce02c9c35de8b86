// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll loop: rate-limited availability checks with adaptive scheduling,
//! session limits, and the per-poll event contract.

use std::time::Duration;

use tokio::time::Instant;

use crate::agent::{sleep_or_stop, Agent, AgentCore};
use crate::client::SeatSource;
use crate::config::Config;
use crate::event::{AgentEvent, EventBus, HealthReason, HealthReasonKind};
use crate::query::Query;
use crate::ratelimit::TokenBucket;
use crate::scheduler::PollScheduler;

/// Internal poll-loop state, logged on transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Polling,
    Detected,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Detected => "detected",
        }
    }
}

/// Outcome of one poll cycle.
enum PollOutcome {
    Success,
    Failed,
    /// The consecutive-error cap was hit; the loop must exit.
    Fatal,
}

pub struct MonitorAgent<S> {
    core: AgentCore,
    source: S,
    query: Option<Query>,
    state: MonitorState,
    scheduler: PollScheduler,
    limiter: TokenBucket,
    request_count: u64,
    consecutive_errors: u32,
    max_consecutive_errors: u32,
    max_session_duration: Duration,
    max_requests: u64,
    started_at: Instant,
}

impl<S: SeatSource> MonitorAgent<S> {
    pub fn new(config: &Config, bus: EventBus, source: S) -> Self {
        // One request per rate-floor seconds, whatever the scheduler asks.
        let floor = config.base_interval.max(config.rate_floor);
        Self {
            core: AgentCore::new("monitor", bus),
            source,
            query: None,
            state: MonitorState::Idle,
            scheduler: PollScheduler::from_config(config),
            limiter: TokenBucket::new(1.0 / floor, 1),
            request_count: 0,
            consecutive_errors: 0,
            max_consecutive_errors: config.max_consecutive_errors,
            max_session_duration: config.max_session_duration(),
            max_requests: config.max_requests_per_session,
            started_at: Instant::now(),
        }
    }

    /// Inject the session query (the orchestrator calls this before start).
    pub fn set_query(&mut self, query: Query) {
        self.query = Some(query);
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    fn set_state(&mut self, next: MonitorState) {
        if self.state != next {
            tracing::debug!(prev = self.state.as_str(), next = next.as_str(), "monitor state");
            self.state = next;
        }
    }

    /// Session limit check, run at the top of every iteration.
    fn limit_reached(&self) -> Option<HealthReason> {
        let elapsed = self.started_at.elapsed();
        if elapsed > self.max_session_duration {
            return Some(HealthReason::new(
                HealthReasonKind::SessionLimit,
                format!("session ran {:.0}s", elapsed.as_secs_f64()),
            ));
        }
        if self.request_count >= self.max_requests {
            return Some(HealthReason::new(
                HealthReasonKind::SessionLimit,
                format!("{} requests issued", self.request_count),
            ));
        }
        None
    }

    async fn poll_once(&mut self, query: &Query) -> PollOutcome {
        self.set_state(MonitorState::Polling);
        self.core.emit(
            "orchestrator",
            AgentEvent::PollStart { request_count: self.request_count + 1 },
        );

        let started = Instant::now();
        match self.source.check(query).await {
            Ok(result) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.consecutive_errors = 0;
                self.request_count += 1;

                self.core.emit(
                    "orchestrator",
                    AgentEvent::PollResult {
                        result: result.clone(),
                        elapsed_ms,
                        request_count: self.request_count,
                    },
                );

                if result.seats_available {
                    self.set_state(MonitorState::Detected);
                    tracing::info!(
                        trains = result.available_trains().count(),
                        elapsed_ms = format!("{elapsed_ms:.0}"),
                        "seats detected"
                    );
                    self.core.emit("orchestrator", AgentEvent::SeatDetected(result));
                } else {
                    self.set_state(MonitorState::Idle);
                    tracing::info!(
                        poll = self.request_count,
                        elapsed_ms = format!("{elapsed_ms:.0}"),
                        "no seats"
                    );
                }
                PollOutcome::Success
            }
            Err(e) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.consecutive_errors += 1;
                self.request_count += 1;
                self.set_state(MonitorState::Idle);

                tracing::warn!(
                    kind = e.kind(),
                    consecutive = self.consecutive_errors,
                    elapsed_ms = format!("{elapsed_ms:.0}"),
                    err = %e,
                    "poll failed"
                );

                if self.consecutive_errors >= self.max_consecutive_errors {
                    self.core.emit(
                        "orchestrator",
                        AgentEvent::HealthCritical(HealthReason::new(
                            HealthReasonKind::ConsecutiveErrors,
                            format!("{} consecutive failures, last: {e}", self.consecutive_errors),
                        )),
                    );
                    return PollOutcome::Fatal;
                }
                PollOutcome::Failed
            }
        }
    }
}

impl<S: SeatSource + 'static> Agent for MonitorAgent<S> {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn setup(&mut self) -> anyhow::Result<()> {
        self.started_at = Instant::now();
        tracing::info!(interval_s = self.scheduler.current_interval(), "monitor ready");
        Ok(())
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let query = match self.query.clone() {
            Some(q) => q,
            None => anyhow::bail!("monitor started without a query"),
        };
        let stop = self.core.stop.clone();
        tracing::info!(query = query.summary(), "monitoring started");

        while !stop.is_cancelled() {
            if let Some(reason) = self.limit_reached() {
                tracing::warn!(reason = %reason, "session limit reached");
                self.core.emit("orchestrator", AgentEvent::HealthCritical(reason));
                break;
            }

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = self.limiter.acquire() => {}
            }

            let outcome = self.poll_once(&query).await;
            let had_error = !matches!(outcome, PollOutcome::Success);
            if matches!(outcome, PollOutcome::Fatal) {
                break;
            }

            let interval = self.scheduler.next_interval(had_error);
            tracing::debug!(wait_s = format!("{:.1}", interval.as_secs_f64()), "next poll");
            if sleep_or_stop(&stop, interval).await {
                break;
            }
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        tracing::info!(polls = self.request_count, "monitor done");
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
