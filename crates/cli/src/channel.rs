// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification sinks. Each channel is best-effort and isolated: a failing
//! channel reports an error without affecting the others.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::query::CheckResult;

/// Trains listed in one notification body.
const MAX_LISTED_TRAINS: usize = 5;

/// Rendered notification content, shared by all channels.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
}

/// Render a detection into a payload, or `None` when nothing is available.
pub fn render(result: &CheckResult) -> Option<NotificationPayload> {
    let available: Vec<_> = result.available_trains().collect();
    if available.is_empty() {
        return None;
    }

    let lines: Vec<String> =
        available.iter().take(MAX_LISTED_TRAINS).map(|t| format!("  {}", t.display_line())).collect();

    Some(NotificationPayload {
        title: "코레일 빈자리 발견!".to_owned(),
        message: lines.join("\n"),
    })
}

/// A named notification sink with a send-with-payload contract.
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send<'a>(&'a self, payload: &'a NotificationPayload) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Build the channel set named in the configuration.
pub fn build_channels(config: &Config) -> anyhow::Result<Vec<Arc<dyn NotifyChannel>>> {
    let mut channels: Vec<Arc<dyn NotifyChannel>> = Vec::new();
    for method in &config.notification_methods {
        match method.as_str() {
            "desktop" => channels.push(Arc::new(DesktopChannel)),
            "sound" => channels.push(Arc::new(SoundChannel)),
            "webhook" => {
                let url = config
                    .webhook_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("webhook channel enabled without a URL"))?;
                channels.push(Arc::new(WebhookChannel::new(url)?));
            }
            other => anyhow::bail!("unknown notification channel: {other}"),
        }
    }
    Ok(channels)
}

/// OS toast via the platform notifier binary.
pub struct DesktopChannel;

impl NotifyChannel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn send<'a>(&'a self, payload: &'a NotificationPayload) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let status = match std::env::consts::OS {
                "linux" => {
                    tokio::process::Command::new("notify-send")
                        .arg(&payload.title)
                        .arg(truncate(&payload.message, 200))
                        .args(["-u", "critical"])
                        .status()
                        .await?
                }
                "macos" => {
                    let script = format!(
                        "display notification \"{}\" with title \"{}\" sound name \"Glass\"",
                        escape_osascript(truncate(&payload.message, 150)),
                        escape_osascript(&payload.title),
                    );
                    tokio::process::Command::new("osascript").args(["-e", &script]).status().await?
                }
                other => anyhow::bail!("desktop notifications unsupported on {other}"),
            };
            anyhow::ensure!(status.success(), "notifier exited with {status}");
            Ok(())
        })
    }
}

/// Terminal bell, three times.
pub struct SoundChannel;

impl NotifyChannel for SoundChannel {
    fn name(&self) -> &'static str {
        "sound"
    }

    fn send<'a>(&'a self, _payload: &'a NotificationPayload) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(b"\x07\x07\x07").await?;
            stdout.flush().await?;
            Ok(())
        })
    }
}

/// JSON POST to a user-supplied URL (Slack/Discord-compatible shape).
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client =
            reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;
        Ok(Self { url, client })
    }
}

impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send<'a>(&'a self, payload: &'a NotificationPayload) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "text": format!("{}\n{}", payload.title, payload.message),
            });
            self.client.post(&self.url).json(&body).send().await?.error_for_status()?;
            Ok(())
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn escape_osascript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
