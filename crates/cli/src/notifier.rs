// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification agent: consumes detections, deduplicates with a cooldown,
//! and fans out to the configured channels concurrently.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::agent::{Agent, AgentCore};
use crate::channel::{self, NotifyChannel};
use crate::config::Config;
use crate::event::{AgentEvent, EventBus};
use crate::query::CheckResult;

/// Pending detections the inbox will hold before dropping new ones.
pub const INBOX_CAPACITY: usize = 32;

pub struct NotifierAgent {
    core: AgentCore,
    inbox: Option<mpsc::Receiver<CheckResult>>,
    cooldown: Duration,
    channels: Vec<Arc<dyn NotifyChannel>>,
    last_notification: Option<Instant>,
    notifications_sent: u64,
}

impl NotifierAgent {
    /// Build the agent with channels from the configuration. Returns the
    /// inbox sender for the orchestrator to enqueue detections on.
    pub fn new(config: &Config, bus: EventBus) -> anyhow::Result<(Self, mpsc::Sender<CheckResult>)> {
        let channels = channel::build_channels(config)?;
        Ok(Self::with_channels(config.notification_cooldown(), bus, channels))
    }

    /// Build the agent with an explicit channel set (used by tests).
    pub fn with_channels(
        cooldown: Duration,
        bus: EventBus,
        channels: Vec<Arc<dyn NotifyChannel>>,
    ) -> (Self, mpsc::Sender<CheckResult>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let agent = Self {
            core: AgentCore::new("notifier", bus),
            inbox: Some(rx),
            cooldown,
            channels,
            last_notification: None,
            notifications_sent: 0,
        };
        (agent, tx)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent
    }

    /// Handle one queued detection: cooldown check, render, fan out.
    async fn process(&mut self, result: CheckResult) {
        if let Some(last) = self.last_notification {
            let since = last.elapsed();
            if since < self.cooldown {
                tracing::debug!(
                    remaining_s = format!("{:.1}", (self.cooldown - since).as_secs_f64()),
                    "notification suppressed by cooldown"
                );
                return;
            }
        }

        let Some(payload) = channel::render(&result) else {
            return;
        };
        let trains_count = result.available_trains().count();
        tracing::info!(trains = trains_count, "dispatching notification");

        // All channels fire concurrently; a failure in one never blocks
        // or fails another.
        let sends = self.channels.iter().map(|ch| {
            let payload = &payload;
            async move { (ch.name(), ch.send(payload).await) }
        });
        let outcomes = join_all(sends).await;

        let mut delivered = 0u32;
        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(channel = name, err = format!("{e:#}"), "channel failed");
                }
            }
        }

        if delivered > 0 {
            self.last_notification = Some(Instant::now());
            self.notifications_sent += 1;
            self.core.emit(
                "orchestrator",
                AgentEvent::NotifyComplete {
                    trains_count,
                    notification_number: self.notifications_sent,
                },
            );
        }
    }
}

impl Agent for NotifierAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn setup(&mut self) -> anyhow::Result<()> {
        let names: Vec<_> = self.channels.iter().map(|c| c.name()).collect();
        tracing::info!(
            channels = names.join(","),
            cooldown_s = self.cooldown.as_secs_f64(),
            "notifier ready"
        );
        Ok(())
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let stop = self.core.stop.clone();
        let mut inbox = self
            .inbox
            .take()
            .ok_or_else(|| anyhow::anyhow!("notifier inbox already consumed"))?;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                item = inbox.recv() => match item {
                    Some(result) => self.process(result).await,
                    None => break,
                },
            }
        }

        self.inbox = Some(inbox);
        Ok(())
    }

    async fn teardown(&mut self) {
        tracing::info!(sent = self.notifications_sent, "notifier done");
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
