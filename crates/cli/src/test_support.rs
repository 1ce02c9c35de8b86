// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests and the end-to-end scenario suite.

use std::collections::VecDeque;

use chrono::{Days, NaiveTime};
use parking_lot::Mutex;

use crate::client::{CheckFailure, SeatSource};
use crate::query::{CheckResult, Query, QueryDraft, SeatClass, TrainClass, TrainInfo};

/// Plays back queued responses, then repeats the fallback forever.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<CheckResult, CheckFailure>>>,
    fallback: Result<CheckResult, CheckFailure>,
}

impl ScriptedSource {
    pub fn new(
        responses: Vec<Result<CheckResult, CheckFailure>>,
        fallback: Result<CheckResult, CheckFailure>,
    ) -> Self {
        Self { responses: Mutex::new(responses.into()), fallback }
    }

    /// A source that always succeeds with the same result.
    pub fn always(result: CheckResult) -> Self {
        Self::new(Vec::new(), Ok(result))
    }

    /// A source that always fails with a transport error.
    pub fn always_failing() -> Self {
        Self::new(Vec::new(), Err(CheckFailure::Transport("connection refused".to_owned())))
    }
}

impl SeatSource for ScriptedSource {
    async fn check(&self, _query: &Query) -> Result<CheckResult, CheckFailure> {
        self.responses.lock().pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// A standard Seoul→Busan KTX query 30 days out.
pub fn sample_query() -> Query {
    let today = chrono::Local::now().date_naive();
    Query {
        departure: "서울".to_owned(),
        arrival: "부산".to_owned(),
        date: today.checked_add_days(Days::new(30)).unwrap_or(today),
        window_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        window_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
        train_class: TrainClass::Ktx,
        seat_class: SeatClass::General,
        passengers: 1,
    }
}

/// The same query built from raw draft fields, exercising validation.
pub fn sample_draft() -> QueryDraft {
    let q = sample_query();
    QueryDraft {
        departure: q.departure,
        arrival: q.arrival,
        date: q.date,
        window_start: q.window_start,
        window_end: q.window_end,
        train_class: q.train_class,
        seat_class: q.seat_class,
        passengers: q.passengers,
    }
}

/// One KTX with open general seats.
pub fn sample_train() -> TrainInfo {
    TrainInfo {
        train_no: "101".to_owned(),
        train_type: "KTX".to_owned(),
        departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        arrival_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap_or(NaiveTime::MIN),
        general_seats: 5,
        special_seats: 0,
        duration_minutes: 150,
    }
}

/// A check result carrying one train with seats.
pub fn result_with_seats() -> CheckResult {
    CheckResult {
        queried_at: std::time::Instant::now(),
        trains: vec![sample_train()],
        seats_available: true,
        raw_response_size: 1024,
    }
}

/// A check result with no trains at all.
pub fn result_no_seats() -> CheckResult {
    CheckResult {
        queried_at: std::time::Instant::now(),
        trains: Vec::new(),
        seats_available: false,
        raw_response_size: 512,
    }
}
