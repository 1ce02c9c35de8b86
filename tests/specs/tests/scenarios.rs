// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end session scenarios against the scripted upstream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use seatwatch::agent::{drive, Agent};
use seatwatch::channel::{NotificationPayload, NotifyChannel};
use seatwatch::client::{CheckFailure, SeatQueryClient, SeatSource};
use seatwatch::notifier::NotifierAgent;
use seatwatch::orchestrator::Orchestrator;
use seatwatch::test_support::{result_with_seats, sample_draft, sample_query};

use seatwatch_specs::{
    dead_endpoint, fail_page, fast_config, page, page_no_seats, page_with_next, page_with_seats,
    train_json, MockUpstream,
};

const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn no_seats_session_ends_at_request_cap() -> anyhow::Result<()> {
    let upstream = MockUpstream::start(Vec::new(), page_no_seats()).await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let orchestrator = Orchestrator::new(&config)?;

    let metrics =
        tokio::time::timeout(SESSION_TIMEOUT, orchestrator.run(sample_query())).await??;

    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.seats_detected, 0);
    assert_eq!(metrics.notifications_sent, 0);
    assert_eq!(upstream.hits(), 3);

    Ok(())
}

#[tokio::test]
async fn detection_on_second_poll_notifies_once() -> anyhow::Result<()> {
    let upstream =
        MockUpstream::start(vec![page_no_seats(), page_with_seats()], page_no_seats()).await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let orchestrator = Orchestrator::new(&config)?;

    let metrics =
        tokio::time::timeout(SESSION_TIMEOUT, orchestrator.run(sample_query())).await??;

    assert_eq!(metrics.seats_detected, 1);
    assert_eq!(metrics.notifications_sent, 1);

    Ok(())
}

#[tokio::test]
async fn connection_errors_end_the_session_after_the_cap() -> anyhow::Result<()> {
    let endpoint = dead_endpoint()?;
    let config = fast_config(&endpoint, &["--connect-timeout", "1", "--request-timeout", "2"]);
    let orchestrator = Orchestrator::new(&config)?;

    let metrics =
        tokio::time::timeout(SESSION_TIMEOUT, orchestrator.run(sample_query())).await??;

    // Failed polls never reach the recorder; the session still ends cleanly.
    assert_eq!(metrics.seats_detected, 0);
    assert_eq!(metrics.notifications_sent, 0);

    Ok(())
}

#[tokio::test]
async fn upstream_rejection_counts_as_a_failed_poll() -> anyhow::Result<()> {
    let upstream =
        MockUpstream::start(Vec::new(), fail_page("P058", "조회 결과가 없습니다")).await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let orchestrator = Orchestrator::new(&config)?;

    let metrics =
        tokio::time::timeout(SESSION_TIMEOUT, orchestrator.run(sample_query())).await??;

    // Three consecutive rejections hit the error cap.
    assert_eq!(metrics.total_requests, 0);
    assert_eq!(upstream.hits(), 3);

    Ok(())
}

// -- Notifier cooldown (scenario-level, real sleeps) --------------------------

struct CountingChannel {
    sent: Arc<AtomicU64>,
}

impl NotifyChannel for CountingChannel {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn send<'a>(&'a self, _payload: &'a NotificationPayload) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }
}

#[tokio::test]
async fn cooldown_drops_the_middle_detection() -> anyhow::Result<()> {
    let sent = Arc::new(AtomicU64::new(0));
    let channel = Arc::new(CountingChannel { sent: Arc::clone(&sent) });
    let (bus, _rx) = seatwatch::event::EventBus::channel();
    let (agent, tx) = NotifierAgent::with_channels(Duration::from_millis(50), bus, vec![channel]);
    let stop = agent.core().stop.clone();
    let worker = tokio::spawn(drive(agent));

    tx.send(result_with_seats()).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(result_with_seats()).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(result_with_seats()).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    stop.cancel();
    worker.await?;
    assert_eq!(sent.load(Ordering::Relaxed), 2);

    Ok(())
}

// -- Pagination ---------------------------------------------------------------

#[tokio::test]
async fn paginated_response_merges_pages_and_sums_bytes() -> anyhow::Result<()> {
    let first = page_with_next(
        vec![train_json("101", "090000", "113000", "11", "5석")],
        "0032",
        "0153",
    );
    let second = page(vec![train_json("153", "103000", "130000", "11", "좌석많음")]);
    let expected_bytes =
        serde_json::to_vec(&first)?.len() + serde_json::to_vec(&second)?.len();

    let upstream = MockUpstream::start(vec![first, second], page_no_seats()).await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let client = SeatQueryClient::new(&config)?;

    let result = client.check(&sample_query()).await?;

    assert_eq!(upstream.hits(), 2);
    assert_eq!(result.trains.len(), 2);
    assert_eq!(result.trains[0].train_no, "101");
    assert_eq!(result.trains[1].train_no, "153");
    assert_eq!(result.raw_response_size, expected_bytes);
    assert!(result.seats_available);

    // The second request carried the continuation tokens.
    let seen = upstream.seen_params();
    assert!(!seen[0].contains_key("h_qry_st_no"));
    assert_eq!(seen[1].get("h_qry_st_no").map(String::as_str), Some("0032"));
    assert_eq!(seen[1].get("h_trn_no").map(String::as_str), Some("0153"));

    Ok(())
}

// -- Station alias normalization ----------------------------------------------

#[tokio::test]
async fn alias_input_reaches_the_wire_normalized() -> anyhow::Result<()> {
    let mut draft = sample_draft();
    draft.departure = "서울역".to_owned();
    draft.arrival = "부산역".to_owned();
    let query = draft.validate()?;
    assert_eq!(query.departure, "서울");
    assert_eq!(query.arrival, "부산");

    let upstream = MockUpstream::start(Vec::new(), page_no_seats()).await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let client = SeatQueryClient::new(&config)?;
    client.check(&query).await?;

    let seen = upstream.seen_params();
    assert_eq!(seen[0].get("txtGoStart").map(String::as_str), Some("서울"));
    assert_eq!(seen[0].get("txtGoEnd").map(String::as_str), Some("부산"));
    assert_eq!(seen[0].get("Device").map(String::as_str), Some("AD"));
    assert_eq!(seen[0].get("txtPsgFlg_1").map(String::as_str), Some("1"));

    Ok(())
}

// -- Error classification at the wire boundary --------------------------------

#[tokio::test]
async fn upstream_fail_surfaces_code_and_message() -> anyhow::Result<()> {
    let upstream =
        MockUpstream::start(vec![fail_page("WRG000000", "존재하지않는 역입니다")], page_no_seats())
            .await?;
    let config = fast_config(upstream.endpoint(), &[]);
    let client = SeatQueryClient::new(&config)?;

    let err = match client.check(&sample_query()).await {
        Err(err) => err,
        Ok(_) => anyhow::bail!("rejection decoded as success"),
    };
    match &err {
        CheckFailure::Upstream { code, message } => {
            assert_eq!(code, "WRG000000");
            assert!(message.contains("역입니다"));
        }
        other => anyhow::bail!("expected upstream failure, got {other}"),
    }
    assert_eq!(err.kind(), "UPSTREAM");

    Ok(())
}

#[tokio::test]
async fn garbage_body_is_a_protocol_failure() -> anyhow::Result<()> {
    // A body the JSON decoder cannot accept: the mock always sends JSON,
    // so serve a plain-text route instead.
    use axum::routing::get;
    let app = axum::Router::new()
        .route("/classes/com.korail.mobile.seatMovie.ScheduleView", get(|| async { "<html>" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let endpoint = format!("http://{addr}/classes/com.korail.mobile.seatMovie.ScheduleView");
    let config = fast_config(&endpoint, &[]);
    let client = SeatQueryClient::new(&config)?;

    let err = match client.check(&sample_query()).await {
        Err(err) => err,
        Ok(_) => anyhow::bail!("garbage decoded as success"),
    };
    assert_eq!(err.kind(), "PROTOCOL");

    Ok(())
}

#[tokio::test]
async fn draft_with_past_date_refuses_to_run() -> anyhow::Result<()> {
    let mut draft = sample_draft();
    draft.date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("bad fixture date"))?;
    assert!(draft.validate().is_err());

    Ok(())
}
