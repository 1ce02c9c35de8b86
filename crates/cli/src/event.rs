// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabulary and the bus agents publish on.
//!
//! Agents hold a cloned [`EventBus`] sender; only the orchestrator reads
//! the receiving end. Upward communication is by message only — no agent
//! holds a reference to the orchestrator.

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::query::{CheckResult, Query};

/// Everything an agent can put on the bus. Payloads ride in the variant.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The validated query entered the pipeline.
    QueryReady(Query),
    /// A poll is about to start.
    PollStart { request_count: u64 },
    /// A poll completed successfully.
    PollResult { result: CheckResult, elapsed_ms: f64, request_count: u64 },
    /// A successful poll found at least one train with seats.
    SeatDetected(CheckResult),
    /// At least one notification channel accepted a dispatch.
    NotifyComplete { trains_count: usize, notification_number: u64 },
    /// A soft limit was crossed; the session continues.
    HealthWarning(HealthReason),
    /// A hard limit was crossed; the session must stop.
    HealthCritical(HealthReason),
    /// External request to end the session.
    SessionStop,
}

impl AgentEvent {
    /// Stable tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryReady(_) => "query.ready",
            Self::PollStart { .. } => "poll.start",
            Self::PollResult { .. } => "poll.result",
            Self::SeatDetected(_) => "seat.detected",
            Self::NotifyComplete { .. } => "notify.complete",
            Self::HealthWarning(_) => "health.warning",
            Self::HealthCritical(_) => "health.critical",
            Self::SessionStop => "session.stop",
        }
    }
}

/// Why a health event fired.
#[derive(Debug, Clone)]
pub struct HealthReason {
    pub kind: HealthReasonKind,
    pub detail: String,
}

impl HealthReason {
    pub fn new(kind: HealthReasonKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

impl fmt::Display for HealthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthReasonKind {
    SlowResponse,
    HighMemory,
    SessionTimeout,
    MemoryLimit,
    SessionLimit,
    ConsecutiveErrors,
}

impl HealthReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowResponse => "slow_response",
            Self::HighMemory => "high_memory",
            Self::SessionTimeout => "session_timeout",
            Self::MemoryLimit => "memory_limit",
            Self::SessionLimit => "session_limit_reached",
            Self::ConsecutiveErrors => "consecutive_errors",
        }
    }
}

/// One bus message: the event plus routing metadata.
#[derive(Debug, Clone)]
pub struct AgentMessage {
    pub event: AgentEvent,
    pub source: &'static str,
    pub target: &'static str,
    pub sent_at: Instant,
}

/// Cloneable sending half of the session event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<AgentMessage>,
}

impl EventBus {
    /// Create the bus, returning the sender handle and the single receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. Sends after the receiver is gone are dropped.
    pub fn emit(&self, source: &'static str, target: &'static str, event: AgentEvent) {
        let _ = self.tx.send(AgentMessage { event, source, target, sent_at: Instant::now() });
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
