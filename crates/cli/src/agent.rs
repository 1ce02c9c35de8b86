// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle plumbing shared by the monitor, notifier, and health
//! tasks: the `setup`/`run`/`teardown` interface, the lifecycle runner,
//! and the suspend-or-stop wait primitive.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::event::{AgentEvent, EventBus};

/// Lifecycle states. An agent walks these monotonically and never revisits
/// one; `Recovering` is entered only when `setup` or `run` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    Init,
    Ready,
    Active,
    Draining,
    Recovering,
    Off,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Recovering => "recovering",
            Self::Off => "off",
        }
    }
}

/// State every agent carries: identity, lifecycle, stop flag, bus handle.
#[derive(Debug)]
pub struct AgentCore {
    pub id: &'static str,
    pub lifecycle: Lifecycle,
    pub stop: CancellationToken,
    pub bus: EventBus,
}

impl AgentCore {
    pub fn new(id: &'static str, bus: EventBus) -> Self {
        Self { id, lifecycle: Lifecycle::Init, stop: CancellationToken::new(), bus }
    }

    pub fn set_lifecycle(&mut self, next: Lifecycle) {
        tracing::debug!(
            agent = self.id,
            prev = self.lifecycle.as_str(),
            next = next.as_str(),
            "lifecycle transition"
        );
        self.lifecycle = next;
    }

    /// Publish an event on the bus, sourced from this agent.
    pub fn emit(&self, target: &'static str, event: AgentEvent) {
        self.bus.emit(self.id, target, event);
    }

    pub fn stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// The interface each agent implements. Construction wires dependencies;
/// `setup` readies internal state; `run` is the main loop; `teardown`
/// releases resources and must not fail.
pub trait Agent: Send + 'static {
    fn core(&self) -> &AgentCore;
    fn core_mut(&mut self) -> &mut AgentCore;

    fn setup(&mut self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
    fn run(&mut self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
    fn teardown(&mut self) -> impl std::future::Future<Output = ()> + Send;
}

/// Run an agent through its full lifecycle. Errors are logged and routed
/// into the `Recovering` state; teardown always runs.
pub async fn drive<A: Agent>(mut agent: A) {
    let id = agent.core().id;

    let result = async {
        agent.setup().await?;
        agent.core_mut().set_lifecycle(Lifecycle::Ready);
        agent.core_mut().set_lifecycle(Lifecycle::Active);
        agent.run().await
    }
    .await;

    if let Err(e) = result {
        tracing::error!(agent = id, err = format!("{e:#}"), "agent failed");
        agent.core_mut().set_lifecycle(Lifecycle::Recovering);
    }

    agent.core_mut().set_lifecycle(Lifecycle::Draining);
    agent.teardown().await;
    agent.core_mut().set_lifecycle(Lifecycle::Off);
}

/// Sleep for `duration` unless the stop token fires first.
///
/// Returns `true` if the wait ended because of a stop. Every timed wait in
/// the pipeline goes through this so cancellation is prompt.
pub async fn sleep_or_stop(stop: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
