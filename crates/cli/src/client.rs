// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the carrier's unauthenticated seat-availability endpoint.
//!
//! The endpoint speaks the mobile app's dialect: station *names* as query
//! parameters, JSON bodies served under a `text/html` content type, and a
//! train list that is an object for one train and an array for many.

use std::fmt;
use std::time::Instant;

use chrono::NaiveTime;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::config::Config;
use crate::query::{duration_minutes, CheckResult, Query, TrainInfo};

/// User-Agent of the carrier's Android app; other agents get rejected.
const USER_AGENT: &str = "Dalvik/2.1.0 (Linux; U; Android 5.1.1; Nexus 4 Build/LMY48T)";

/// Hard cap on continuation pages per poll.
const MAX_PAGES: usize = 5;

/// Substrings of the reservation display name that mean "no seats" even
/// when the reservation code claims otherwise.
const SOLD_OUT_MARKERS: [&str; 4] = ["매진", "대기", "마감", "없음"];

/// Substrings that mean "plenty" without giving an exact count.
const PLENTY_MARKERS: [&str; 3] = ["많음", "충분", "가능"];

/// A failed availability check.
///
/// All three kinds are equivalent at the poll site: they count toward the
/// monitor's consecutive-error run and trigger backoff.
#[derive(Debug, Clone)]
pub enum CheckFailure {
    /// Network error, timeout, or non-2xx status.
    Transport(String),
    /// Response body did not decode as the expected JSON shape.
    Protocol(String),
    /// The endpoint answered `strResult == "FAIL"`.
    Upstream { code: String, message: String },
}

impl CheckFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT",
            Self::Protocol(_) => "PROTOCOL",
            Self::Upstream { .. } => "UPSTREAM",
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(detail) => write!(f, "transport failure: {detail}"),
            Self::Protocol(detail) => write!(f, "protocol failure: {detail}"),
            Self::Upstream { code, message } => write!(f, "upstream rejection [{code}]: {message}"),
        }
    }
}

impl std::error::Error for CheckFailure {}

/// The seam the monitor polls through. Production uses [`SeatQueryClient`];
/// tests substitute a scripted source.
pub trait SeatSource: Send + Sync {
    fn check(
        &self,
        query: &Query,
    ) -> impl std::future::Future<Output = Result<CheckResult, CheckFailure>> + Send;
}

/// One availability query per call, pages merged into a single result.
pub struct SeatQueryClient {
    endpoint: String,
    client: reqwest::Client,
}

impl SeatQueryClient {
    /// Build the client with one shared keep-alive pool for the session.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self { endpoint: config.endpoint.clone(), client })
    }

    /// Fetch and decode one page, returning the value and its raw byte size.
    async fn fetch_page(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<(Value, usize), CheckFailure> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| CheckFailure::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CheckFailure::Transport(e.to_string()))?;

        let bytes = resp.bytes().await.map_err(|e| CheckFailure::Transport(e.to_string()))?;

        // The endpoint labels JSON bodies as text/html; decode from bytes
        // without consulting the content type.
        let data: Value = serde_json::from_slice(&bytes)
            .map_err(|e| CheckFailure::Protocol(e.to_string()))?;

        if data.get("strResult").and_then(|v| v.as_str()) == Some("FAIL") {
            let code = data.get("h_msg_cd").and_then(|v| v.as_str()).unwrap_or("").to_owned();
            let message = data.get("h_msg_txt").and_then(|v| v.as_str()).unwrap_or("").to_owned();
            return Err(CheckFailure::Upstream { code, message });
        }

        Ok((data, bytes.len()))
    }
}

impl SeatSource for SeatQueryClient {
    async fn check(&self, query: &Query) -> Result<CheckResult, CheckFailure> {
        let queried_at = Instant::now();
        let mut trains = Vec::new();
        let mut raw_response_size = 0usize;
        let mut next: Option<(String, String)> = None;

        for page in 1..=MAX_PAGES {
            let mut params = build_params(query);
            if let Some((start_no, train_no)) = next.take() {
                params.push(("h_qry_st_no", start_no));
                params.push(("h_trn_no", train_no));
            }

            let (data, size) = self.fetch_page(&params).await?;
            raw_response_size += size;
            trains.extend(parse_trains(&data, query));

            next = continuation(&data);
            if next.is_none() {
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(pages = MAX_PAGES, "pagination cap reached; remaining pages dropped");
            }
        }

        let seats_available = trains.iter().any(TrainInfo::has_seats);
        Ok(CheckResult { queried_at, trains, seats_available, raw_response_size })
    }
}

/// Query parameters for one page, in the mobile app's schema.
fn build_params(query: &Query) -> Vec<(&'static str, String)> {
    let train_code = query.train_class.upstream_code();
    vec![
        // Mobile-app administrative fields.
        ("Device", "AD".to_owned()),
        ("Version", "190617001".to_owned()),
        // The lookup itself. Station names, not codes.
        ("txtGoStart", query.departure.clone()),
        ("txtGoEnd", query.arrival.clone()),
        ("txtGoAbrdDt", query.date.format("%Y%m%d").to_string()),
        ("txtGoHour", query.window_start.format("%H%M%S").to_string()),
        ("selGoTrain", train_code.to_owned()),
        ("txtTrnGpCd", train_code.to_owned()),
        ("txtSeatAttCd", query.seat_class.upstream_code().to_owned()),
        // Passenger distribution: adults in slot 1, the rest zeroed.
        ("txtPsgFlg_1", query.passengers.to_string()),
        ("txtPsgFlg_2", "0".to_owned()),
        ("txtPsgFlg_3", "0".to_owned()),
        ("txtPsgFlg_4", "0".to_owned()),
        ("txtPsgFlg_5", "0".to_owned()),
        ("txtCardPsgCnt", "0".to_owned()),
        ("txtTotPsgCnt", query.passengers.to_string()),
        ("txtSeatAttCd_2", "000".to_owned()),
        ("txtSeatAttCd_3", "000".to_owned()),
        ("txtSeatAttCd_4", "015".to_owned()),
        ("radJobId", "1".to_owned()),
        ("txtMenuId", "11".to_owned()),
        ("txtGdNo", String::new()),
        ("txtJobDv", String::new()),
    ]
}

/// Continuation tokens for the next page, if the response flags one.
fn continuation(data: &Value) -> Option<(String, String)> {
    if data.get("h_next_pg_flg").and_then(|v| v.as_str()) != Some("Y") {
        return None;
    }
    let start_no = data.get("h_qry_st_no_next").and_then(|v| v.as_str())?.to_owned();
    let train_no = data.get("h_trn_no_next").and_then(|v| v.as_str())?.to_owned();
    Some((start_no, train_no))
}

/// Extract trains from one page, applying the departure-window filter.
fn parse_trains(data: &Value, query: &Query) -> Vec<TrainInfo> {
    // A single train arrives as a bare object, several as an array.
    let items: Vec<&Value> = match data.pointer("/trn_infos/trn_info") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(one @ Value::Object(_)) => vec![one],
        _ => Vec::new(),
    };

    let mut trains = Vec::with_capacity(items.len());
    for item in items {
        let field = |key: &str| item.get(key).and_then(|v| v.as_str()).unwrap_or("");

        let departure_time = parse_hhmmss(field("h_dpt_tm"));
        if departure_time < query.window_start || departure_time > query.window_end {
            continue;
        }
        let arrival_time = parse_hhmmss(field("h_arv_tm"));

        trains.push(TrainInfo {
            train_no: field("h_trn_no").to_owned(),
            train_type: field("h_trn_clsf_nm").to_owned(),
            departure_time,
            arrival_time,
            general_seats: seat_count(
                item.get("h_gen_rsv_cd").and_then(|v| v.as_str()).unwrap_or("00"),
                field("h_gen_rsv_nm"),
            ),
            special_seats: seat_count(
                item.get("h_spe_rsv_cd").and_then(|v| v.as_str()).unwrap_or("00"),
                field("h_spe_rsv_nm"),
            ),
            duration_minutes: duration_minutes(departure_time, arrival_time),
        });
    }
    trains
}

/// Derive a seat count from a reservation code plus its display name.
///
/// The code is authoritative for availability; the name refines the count.
/// Codes other than "00", "11", and "13" are undocumented upstream and
/// treated as sold out.
pub fn seat_count(code: &str, name: &str) -> u32 {
    match code {
        "11" | "13" => {}
        "00" => return 0,
        other => {
            tracing::debug!(code = other, "unexpected reservation code; treating as sold out");
            return 0;
        }
    }

    if SOLD_OUT_MARKERS.iter().any(|marker| name.contains(marker)) {
        return 0;
    }
    if PLENTY_MARKERS.iter().any(|marker| name.contains(marker)) {
        return 99;
    }

    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        1
    } else {
        digits.parse().unwrap_or(99)
    }
}

/// Parse an `HHMMSS` (or `HHMM`) wall-clock string, leniently.
fn parse_hhmmss(s: &str) -> NaiveTime {
    let t = s.trim();
    let hour = t.get(0..2).and_then(|p| p.parse().ok()).unwrap_or(0);
    let minute = t.get(2..4).and_then(|p| p.parse().ok()).unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
