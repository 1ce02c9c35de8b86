// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use crate::query::{self, Query, QueryDraft, SeatClass, TrainClass};

/// Default endpoint behind the carrier's mobile app.
pub const DEFAULT_ENDPOINT: &str =
    "https://smart.letskorail.com:443/classes/com.korail.mobile.seatMovie.ScheduleView";

/// Seat availability watcher for one train segment.
#[derive(Debug, Clone, Parser)]
#[command(name = "seatwatch", version, about)]
pub struct Config {
    /// Poll period floor in seconds.
    #[arg(long, default_value_t = 30.0, env = "SEATWATCH_BASE_INTERVAL")]
    pub base_interval: f64,

    /// Backoff ceiling in seconds.
    #[arg(long, default_value_t = 300.0, env = "SEATWATCH_MAX_INTERVAL")]
    pub max_interval: f64,

    /// Interval multiplier applied after a failed poll.
    #[arg(long, default_value_t = 1.5, env = "SEATWATCH_BACKOFF_MULTIPLIER")]
    pub backoff_multiplier: f64,

    /// Uniform jitter added to every computed interval, in seconds.
    #[arg(long, default_value_t = 5.0, env = "SEATWATCH_JITTER_RANGE")]
    pub jitter_range: f64,

    /// Session lifetime cap in seconds.
    #[arg(long, default_value_t = 21600.0, env = "SEATWATCH_MAX_SESSION_DURATION")]
    pub max_session_duration: f64,

    /// Consecutive poll failures before the session aborts.
    #[arg(long, default_value_t = 10, env = "SEATWATCH_MAX_CONSECUTIVE_ERRORS")]
    pub max_consecutive_errors: u32,

    /// Requests allowed per session.
    #[arg(long, default_value_t = 720, env = "SEATWATCH_MAX_REQUESTS_PER_SESSION")]
    pub max_requests_per_session: u64,

    /// Successful polls between memory samples.
    #[arg(long, default_value_t = 50, env = "SEATWATCH_GC_INTERVAL")]
    pub gc_interval: u32,

    /// Minimum seconds between two notifications.
    #[arg(long, default_value_t = 60.0, env = "SEATWATCH_NOTIFICATION_COOLDOWN")]
    pub notification_cooldown: f64,

    /// Notification channels (comma-separated: desktop, sound, webhook).
    #[arg(
        long = "notify",
        value_delimiter = ',',
        default_value = "desktop,sound",
        env = "SEATWATCH_NOTIFY"
    )]
    pub notification_methods: Vec<String>,

    /// Webhook URL for the webhook channel.
    #[arg(long, env = "SEATWATCH_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Total HTTP request timeout in seconds.
    #[arg(long, default_value_t = 15.0, env = "SEATWATCH_REQUEST_TIMEOUT")]
    pub request_timeout: f64,

    /// HTTP connect timeout in seconds.
    #[arg(long, default_value_t = 5.0, env = "SEATWATCH_CONNECT_TIMEOUT")]
    pub connect_timeout: f64,

    /// HTTP connection pool size.
    #[arg(long, default_value_t = 3, env = "SEATWATCH_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "SEATWATCH_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SEATWATCH_LOG_LEVEL")]
    pub log_level: String,

    /// Availability endpoint override (for testing against a stub).
    #[arg(long, hide = true, default_value = DEFAULT_ENDPOINT, env = "SEATWATCH_ENDPOINT")]
    pub endpoint: String,

    /// Hard floor on seconds between outbound requests.
    #[arg(long, hide = true, default_value_t = 10.0, env = "SEATWATCH_RATE_FLOOR")]
    pub rate_floor: f64,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_interval <= 0.0 {
            anyhow::bail!("--base-interval must be positive");
        }
        if self.max_interval < self.base_interval {
            anyhow::bail!("--max-interval must be at least --base-interval");
        }
        if self.backoff_multiplier < 1.0 {
            anyhow::bail!("--backoff-multiplier must be at least 1.0");
        }
        if self.jitter_range < 0.0 {
            anyhow::bail!("--jitter-range must not be negative");
        }
        if self.max_connections == 0 {
            anyhow::bail!("--max-connections must be at least 1");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }

        for method in &self.notification_methods {
            if !matches!(method.as_str(), "desktop" | "sound" | "webhook") {
                anyhow::bail!("unknown notification channel: {method}");
            }
        }
        let wants_webhook = self.notification_methods.iter().any(|m| m == "webhook");
        if wants_webhook && self.webhook_url.is_none() {
            anyhow::bail!("--webhook-url is required when the webhook channel is enabled");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout)
    }

    pub fn max_session_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_session_duration)
    }

    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.notification_cooldown)
    }
}

/// Query parameters as passed on the command line.
#[derive(Debug, Clone, clap::Args)]
pub struct QueryArgs {
    /// Departure station name.
    #[arg(short = 'd', long, env = "SEATWATCH_DEPARTURE")]
    pub departure: String,

    /// Arrival station name.
    #[arg(short = 'a', long, env = "SEATWATCH_ARRIVAL")]
    pub arrival: String,

    /// Departure date (YYYY-MM-DD).
    #[arg(long, env = "SEATWATCH_DATE")]
    pub date: String,

    /// Start of the preferred departure window (HH:MM).
    #[arg(long, env = "SEATWATCH_TIME_START")]
    pub time_start: String,

    /// End of the preferred departure window (HH:MM).
    #[arg(long, env = "SEATWATCH_TIME_END")]
    pub time_end: String,

    /// Train class (KTX, KTX-산천, KTX-이음, ITX-새마을, ITX-청춘, 무궁화, 전체).
    #[arg(long, default_value = "KTX")]
    pub train_class: String,

    /// Seat class (일반실 or 특실).
    #[arg(long, default_value = "일반실")]
    pub seat_class: String,

    /// Passenger count (1-9).
    #[arg(short = 'p', long, default_value_t = 1)]
    pub passengers: u8,
}

impl QueryArgs {
    /// Parse and validate into an immutable [`Query`].
    pub fn to_query(&self) -> anyhow::Result<Query> {
        let train_class = TrainClass::parse(&self.train_class)
            .ok_or_else(|| anyhow::anyhow!("invalid train class: {}", self.train_class))?;
        let seat_class = SeatClass::parse(&self.seat_class)
            .ok_or_else(|| anyhow::anyhow!("invalid seat class: {}", self.seat_class))?;

        QueryDraft {
            departure: self.departure.clone(),
            arrival: self.arrival.clone(),
            date: query::parse_date(&self.date)?,
            window_start: query::parse_time(&self.time_start)?,
            window_end: query::parse_time(&self.time_end)?,
            train_class,
            seat_class,
            passengers: self.passengers,
        }
        .validate()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
