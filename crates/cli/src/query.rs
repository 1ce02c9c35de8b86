// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable data contracts: the session query, per-train info, and the
//! per-poll check result.

use chrono::{Days, NaiveDate, NaiveTime};

use crate::station;

/// How far ahead a departure date may lie.
const MAX_FUTURE_DAYS: u64 = 90;

/// Closed vocabulary of train classes the upstream endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainClass {
    Ktx,
    KtxSancheon,
    KtxEum,
    ItxSaemaeul,
    ItxCheongchun,
    Mugunghwa,
    All,
}

impl TrainClass {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "KTX" => Some(Self::Ktx),
            "KTX-산천" => Some(Self::KtxSancheon),
            "KTX-이음" => Some(Self::KtxEum),
            "ITX-새마을" => Some(Self::ItxSaemaeul),
            "ITX-청춘" => Some(Self::ItxCheongchun),
            "무궁화" => Some(Self::Mugunghwa),
            "전체" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ktx => "KTX",
            Self::KtxSancheon => "KTX-산천",
            Self::KtxEum => "KTX-이음",
            Self::ItxSaemaeul => "ITX-새마을",
            Self::ItxCheongchun => "ITX-청춘",
            Self::Mugunghwa => "무궁화",
            Self::All => "전체",
        }
    }

    /// Upstream group code. "전체" maps to the catch-all code.
    pub fn upstream_code(&self) -> &'static str {
        match self {
            Self::Ktx | Self::KtxSancheon | Self::KtxEum => "100",
            Self::ItxSaemaeul => "101",
            Self::ItxCheongchun | Self::All => "109",
            Self::Mugunghwa => "102",
        }
    }
}

/// Seat class (general or special car).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatClass {
    General,
    Special,
}

impl SeatClass {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "일반실" => Some(Self::General),
            "특실" => Some(Self::Special),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "일반실",
            Self::Special => "특실",
        }
    }

    /// Upstream seat-attribute code.
    pub fn upstream_code(&self) -> &'static str {
        match self {
            Self::General => "015",
            Self::Special => "011",
        }
    }
}

/// Raw query fields as collected from a front-end, before validation.
#[derive(Debug, Clone)]
pub struct QueryDraft {
    pub departure: String,
    pub arrival: String,
    pub date: NaiveDate,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub train_class: TrainClass,
    pub seat_class: SeatClass,
    pub passengers: u8,
}

impl QueryDraft {
    /// Validate against today's date and produce an immutable [`Query`].
    pub fn validate(self) -> anyhow::Result<Query> {
        let today = chrono::Local::now().date_naive();
        self.validate_at(today)
    }

    /// Validation with an explicit "today", so date rules are testable.
    pub fn validate_at(self, today: NaiveDate) -> anyhow::Result<Query> {
        let departure = station::normalize(&self.departure).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown departure station '{}' (supported: {})",
                self.departure,
                station::supported_stations().join(", ")
            )
        })?;
        let arrival = station::normalize(&self.arrival).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown arrival station '{}' (supported: {})",
                self.arrival,
                station::supported_stations().join(", ")
            )
        })?;

        if departure == arrival {
            anyhow::bail!("departure and arrival stations are the same");
        }
        if self.date < today {
            anyhow::bail!("departure date {} is in the past", self.date);
        }
        let horizon = today
            .checked_add_days(Days::new(MAX_FUTURE_DAYS))
            .ok_or_else(|| anyhow::anyhow!("date arithmetic overflow"))?;
        if self.date > horizon {
            anyhow::bail!("departure date must be within {MAX_FUTURE_DAYS} days");
        }
        if self.window_end <= self.window_start {
            anyhow::bail!("time window end must be after its start");
        }
        if self.passengers < 1 || self.passengers > 9 {
            anyhow::bail!("passenger count must be between 1 and 9");
        }

        Ok(Query {
            departure: departure.to_owned(),
            arrival: arrival.to_owned(),
            date: self.date,
            window_start: self.window_start,
            window_end: self.window_end,
            train_class: self.train_class,
            seat_class: self.seat_class,
            passengers: self.passengers,
        })
    }
}

/// One validated, immutable availability query. Created once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub departure: String,
    pub arrival: String,
    pub date: NaiveDate,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub train_class: TrainClass,
    pub seat_class: SeatClass,
    pub passengers: u8,
}

impl Query {
    /// One-line rendering for logs.
    pub fn summary(&self) -> String {
        format!(
            "{}→{} {} {}~{} {} {} {}명",
            self.departure,
            self.arrival,
            self.date,
            self.window_start.format("%H:%M"),
            self.window_end.format("%H:%M"),
            self.train_class.as_str(),
            self.seat_class.as_str(),
            self.passengers,
        )
    }
}

/// One scheduled train as returned by the endpoint, after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainInfo {
    pub train_no: String,
    pub train_type: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub general_seats: u32,
    pub special_seats: u32,
    pub duration_minutes: u32,
}

impl TrainInfo {
    pub fn has_seats(&self) -> bool {
        self.general_seats > 0 || self.special_seats > 0
    }

    /// Compact single-line rendering used in notification bodies.
    pub fn display_line(&self) -> String {
        let mut seats = Vec::new();
        if self.general_seats > 0 {
            seats.push(format!("일반 {}석", self.general_seats));
        }
        if self.special_seats > 0 {
            seats.push(format!("특실 {}석", self.special_seats));
        }
        let mut line = format!(
            "{} {}호 {}→{}",
            self.train_type,
            self.train_no,
            self.departure_time.format("%H:%M"),
            self.arrival_time.format("%H:%M"),
        );
        if !seats.is_empty() {
            line.push_str(&format!(" ({})", seats.join(" / ")));
        }
        line
    }
}

/// Travel time in minutes between two wall-clock times.
///
/// An arrival at or before the departure is taken to cross midnight.
pub fn duration_minutes(departure: NaiveTime, arrival: NaiveTime) -> u32 {
    let dep = departure.signed_duration_since(NaiveTime::MIN).num_minutes();
    let arr = arrival.signed_duration_since(NaiveTime::MIN).num_minutes();
    let diff = arr - dep;
    if diff <= 0 {
        (diff + 1440) as u32
    } else {
        diff as u32
    }
}

/// Outcome of one complete poll (all pages merged, window filter applied).
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Monotonic timestamp taken when the poll started.
    pub queried_at: std::time::Instant,
    pub trains: Vec<TrainInfo>,
    pub seats_available: bool,
    /// Total response bytes across all pages.
    pub raw_response_size: usize,
}

impl CheckResult {
    pub fn available_trains(&self) -> impl Iterator<Item = &TrainInfo> {
        self.trains.iter().filter(|t| t.has_seats())
    }
}

/// Parse `YYYY-MM-DD` or `YYYYMMDD` into a date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    let compact: String = s.trim().chars().filter(|c| *c != '-').collect();
    NaiveDate::parse_from_str(&compact, "%Y%m%d")
        .map_err(|_| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

/// Parse `HH:MM` or `HHMM` into a wall-clock time.
pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let compact: String = s.trim().chars().filter(|c| *c != ':').collect();
    NaiveTime::parse_from_str(&compact, "%H%M")
        .map_err(|_| anyhow::anyhow!("invalid time '{s}' (expected HH:MM)"))
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
