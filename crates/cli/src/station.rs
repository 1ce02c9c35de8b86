// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded station-code table and user-input normalization.
//!
//! The upstream endpoint takes station *names*, not codes, but the code
//! table doubles as the list of supported stations so bad input fails at
//! validation instead of mid-session.

/// Canonical station name → carrier-assigned 4-digit code.
const STATIONS: &[(&str, &str)] = &[
    ("서울", "0001"),
    ("용산", "0015"),
    ("영등포", "0020"),
    ("광명", "0502"),
    ("수원", "0055"),
    ("천안아산", "0297"),
    ("오송", "0298"),
    ("대전", "0010"),
    ("김천구미", "0507"),
    ("동대구", "0508"),
    ("경주", "0519"),
    ("포항", "0515"),
    ("울산(통도사)", "0930"),
    ("부산", "0032"),
    ("광주송정", "0036"),
    ("목포", "0041"),
    ("전주", "0045"),
    ("익산", "0030"),
    ("여수엑스포", "0049"),
    ("강릉", "0115"),
    ("평창", "0112"),
    ("진주", "0056"),
];

/// Common alias → canonical name (e.g. "서울역" → "서울").
const ALIASES: &[(&str, &str)] = &[
    ("서울역", "서울"),
    ("용산역", "용산"),
    ("부산역", "부산"),
    ("대전역", "대전"),
    ("동대구역", "동대구"),
    ("울산", "울산(통도사)"),
    ("울산역", "울산(통도사)"),
    ("통도사", "울산(통도사)"),
    ("광주", "광주송정"),
    ("여수", "여수엑스포"),
    ("김천", "김천구미"),
    ("구미", "김천구미"),
    ("천안", "천안아산"),
    ("아산", "천안아산"),
];

/// Normalize a user-supplied station name to its canonical form.
///
/// Strips whitespace, resolves aliases, and returns `None` for stations
/// the table does not know.
pub fn normalize(name: &str) -> Option<&'static str> {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let resolved = ALIASES
        .iter()
        .find(|(alias, _)| *alias == compact)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(compact.as_str());
    STATIONS.iter().find(|(station, _)| *station == resolved).map(|(station, _)| *station)
}

/// Look up the carrier code for a canonical station name.
pub fn station_code(name: &str) -> Option<&'static str> {
    STATIONS.iter().find(|(station, _)| *station == name).map(|(_, code)| *code)
}

/// All supported canonical station names, for error messages.
pub fn supported_stations() -> Vec<&'static str> {
    STATIONS.iter().map(|(station, _)| *station).collect()
}

#[cfg(test)]
#[path = "station_tests.rs"]
mod tests;
