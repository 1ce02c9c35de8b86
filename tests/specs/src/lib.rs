// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end session scenarios.
//!
//! Runs the orchestrator in-process against a scripted stand-in for the
//! carrier's availability endpoint, served over real HTTP by axum.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use parking_lot::Mutex;
use serde_json::{json, Value};

use seatwatch::config::Config;

/// Path the real endpoint lives under; the mock serves the same one.
const ENDPOINT_PATH: &str = "/classes/com.korail.mobile.seatMovie.ScheduleView";

#[derive(Clone)]
struct MockState {
    hits: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Value>>>,
    fallback: Arc<Value>,
    seen_params: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn serve_page(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::Relaxed);
    state.seen_params.lock().push(params);
    let body = state.script.lock().pop_front().unwrap_or_else(|| (*state.fallback).clone());
    Json(body)
}

/// A scripted upstream: plays the queued pages in order, then repeats the
/// fallback. Aborted on drop.
pub struct MockUpstream {
    endpoint: String,
    hits: Arc<AtomicUsize>,
    seen_params: Arc<Mutex<Vec<HashMap<String, String>>>>,
    server: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(script: Vec<Value>, fallback: Value) -> anyhow::Result<Self> {
        let state = MockState {
            hits: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(script.into())),
            fallback: Arc::new(fallback),
            seen_params: Arc::new(Mutex::new(Vec::new())),
        };
        let hits = Arc::clone(&state.hits);
        let seen_params = Arc::clone(&state.seen_params);

        let app = Router::new().route(ENDPOINT_PATH, get(serve_page)).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { endpoint: format!("http://{addr}{ENDPOINT_PATH}"), hits, seen_params, server })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Query parameters of every request received, in arrival order.
    pub fn seen_params(&self) -> Vec<HashMap<String, String>> {
        self.seen_params.lock().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A URL nothing listens on, for transport-failure scenarios.
pub fn dead_endpoint() -> anyhow::Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}{ENDPOINT_PATH}"))
}

/// Config tuned for test speed, pointed at the given endpoint.
pub fn fast_config(endpoint: &str, extra: &[&str]) -> Config {
    seatwatch::ensure_crypto();
    let mut args = vec![
        "seatwatch",
        "--endpoint",
        endpoint,
        "--base-interval",
        "0.05",
        "--max-interval",
        "0.2",
        "--jitter-range",
        "0",
        "--rate-floor",
        "0.01",
        "--max-requests-per-session",
        "3",
        "--max-consecutive-errors",
        "3",
        "--notification-cooldown",
        "0.01",
        "--notify",
        "sound",
    ];
    args.extend_from_slice(extra);
    Config::parse_from(args)
}

// -- Response builders --------------------------------------------------------

/// One train entry in the endpoint's field dialect.
pub fn train_json(no: &str, dep: &str, arr: &str, gen_cd: &str, gen_nm: &str) -> Value {
    json!({
        "h_trn_no": no,
        "h_trn_clsf_nm": "KTX",
        "h_dpt_tm": dep,
        "h_arv_tm": arr,
        "h_gen_rsv_cd": gen_cd,
        "h_gen_rsv_nm": gen_nm,
        "h_spe_rsv_cd": "00",
        "h_spe_rsv_nm": "매진",
    })
}

/// A final page carrying the given trains.
pub fn page(trains: Vec<Value>) -> Value {
    json!({
        "strResult": "SUCC",
        "h_next_pg_flg": "N",
        "trn_infos": { "trn_info": trains },
    })
}

/// A page that points at a continuation.
pub fn page_with_next(trains: Vec<Value>, start_no: &str, train_no: &str) -> Value {
    json!({
        "strResult": "SUCC",
        "h_next_pg_flg": "Y",
        "h_qry_st_no_next": start_no,
        "h_trn_no_next": train_no,
        "trn_infos": { "trn_info": trains },
    })
}

/// A page with one sold-out train.
pub fn page_no_seats() -> Value {
    page(vec![train_json("101", "090000", "113000", "00", "매진")])
}

/// A page with one train with plenty of seats.
pub fn page_with_seats() -> Value {
    page(vec![train_json("101", "090000", "113000", "11", "좌석많음")])
}

/// An upstream rejection.
pub fn fail_page(code: &str, message: &str) -> Value {
    json!({
        "strResult": "FAIL",
        "h_msg_cd": code,
        "h_msg_txt": message,
    })
}
