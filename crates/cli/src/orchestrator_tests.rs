// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::Orchestrator;
use crate::config::Config;
use crate::event::AgentEvent;
use crate::test_support::{result_no_seats, result_with_seats, sample_query, ScriptedSource};

fn config(extra: &[&str]) -> Config {
    let mut pairs: Vec<(&str, &str)> = vec![
        ("--base-interval", "0.01"),
        ("--max-interval", "0.05"),
        ("--jitter-range", "0"),
        ("--rate-floor", "0.01"),
        ("--max-requests-per-session", "3"),
        ("--max-consecutive-errors", "2"),
        ("--notification-cooldown", "0.01"),
        ("--notify", "sound"),
    ];
    for chunk in extra.chunks(2) {
        let (flag, value) = (chunk[0], chunk[1]);
        if let Some(existing) = pairs.iter_mut().find(|(f, _)| *f == flag) {
            existing.1 = value;
        } else {
            pairs.push((flag, value));
        }
    }
    let mut args = vec!["seatwatch"];
    for (flag, value) in &pairs {
        args.push(flag);
        args.push(value);
    }
    Config::parse_from(args)
}

#[tokio::test(start_paused = true)]
async fn session_ends_at_request_cap() {
    let orch =
        Orchestrator::with_source(&config(&[]), ScriptedSource::always(result_no_seats())).unwrap();

    let metrics = tokio::time::timeout(Duration::from_secs(60), orch.run(sample_query()))
        .await
        .expect("session never ended")
        .unwrap();

    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.successful_checks, 3);
    assert_eq!(metrics.seats_detected, 0);
    assert_eq!(metrics.notifications_sent, 0);
}

#[tokio::test(start_paused = true)]
async fn detection_flows_through_to_notification() {
    let source = ScriptedSource::new(
        vec![Ok(result_no_seats()), Ok(result_with_seats())],
        Ok(result_no_seats()),
    );
    let orch = Orchestrator::with_source(&config(&[]), source).unwrap();

    let metrics = tokio::time::timeout(Duration::from_secs(60), orch.run(sample_query()))
        .await
        .expect("session never ended")
        .unwrap();

    assert_eq!(metrics.seats_detected, 1);
    assert_eq!(metrics.notifications_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn consecutive_errors_end_the_session_cleanly() {
    let orch =
        Orchestrator::with_source(&config(&[]), ScriptedSource::always_failing()).unwrap();

    let metrics = tokio::time::timeout(Duration::from_secs(60), orch.run(sample_query()))
        .await
        .expect("session never ended")
        .unwrap();

    assert_eq!(metrics.seats_detected, 0);
    assert_eq!(metrics.notifications_sent, 0);
}

#[tokio::test(start_paused = true)]
async fn external_stop_is_honored_within_the_shutdown_bound() {
    let cfg = config(&[
        "--base-interval",
        "3600",
        "--max-interval",
        "3600",
        "--max-requests-per-session",
        "1000",
    ]);
    let orch =
        Orchestrator::with_source(&cfg, ScriptedSource::always(result_no_seats())).unwrap();
    let handle = orch.stop_handle();

    let session = tokio::spawn(orch.run(sample_query()));
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stopped_at = tokio::time::Instant::now();
    handle.stop();
    // Stopping twice is fine.
    handle.stop();

    let metrics = tokio::time::timeout(Duration::from_secs(30), session)
        .await
        .expect("run did not return after stop")
        .unwrap()
        .unwrap();

    // Well inside the 10s drain bound: every wait is stop-interruptible.
    assert!(stopped_at.elapsed() <= super::SHUTDOWN_TIMEOUT);
    assert!(metrics.total_requests >= 1);
}

#[tokio::test(start_paused = true)]
async fn session_stop_event_ends_the_session() {
    let cfg = config(&[
        "--base-interval",
        "3600",
        "--max-interval",
        "3600",
        "--max-requests-per-session",
        "1000",
    ]);
    let orch =
        Orchestrator::with_source(&cfg, ScriptedSource::always(result_no_seats())).unwrap();
    let bus = orch.event_bus();

    let session = tokio::spawn(orch.run(sample_query()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    bus.emit("shell", "orchestrator", AgentEvent::SessionStop);

    tokio::time::timeout(Duration::from_secs(30), session)
        .await
        .expect("run did not return after session stop")
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn cooldown_suppresses_repeat_notifications() {
    // Seats on every poll, cooldown much longer than the poll interval:
    // only the first detection notifies.
    let cfg = config(&["--notification-cooldown", "3600"]);
    let orch =
        Orchestrator::with_source(&cfg, ScriptedSource::always(result_with_seats())).unwrap();

    let metrics = tokio::time::timeout(Duration::from_secs(60), orch.run(sample_query()))
        .await
        .expect("session never ended")
        .unwrap();

    assert_eq!(metrics.seats_detected, 3);
    assert_eq!(metrics.notifications_sent, 1);
}
