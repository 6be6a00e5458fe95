// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-of-day windows restricting when a job may be sent
//!
//! Syntax: comma separated clauses, each a day list followed by an optional
//! `HHMM-HHMM` window. Days are `Any`, `Wk` (Monday..Friday) or two/three
//! letter names (`Su`, `Mon`, ...), concatenated. `Never` allows nothing.
//!
//! ```text
//! Any
//! Wk0800-1700
//! MoWeFr0900-1200,Sa1000-1400
//! Any2200-0600        (window wraps past midnight)
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TodError {
    #[error("empty time-of-day clause")]
    Empty,
    #[error("unknown day name in {0:?}")]
    BadDay(String),
    #[error("bad time window in {0:?}")]
    BadWindow(String),
}

const ALL_DAYS: u8 = 0x7f;
const WEEKDAYS: u8 = 0x3e;
const DAY_MINUTES: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clause {
    /// Bit 0 = Sunday .. bit 6 = Saturday
    days: u8,
    /// Minutes since midnight, inclusive
    start: u16,
    /// Minutes since midnight, exclusive; less than `start` wraps
    end: u16,
}

impl Clause {
    fn has_day(&self, weekday_from_sunday: u32) -> bool {
        self.days & (1 << weekday_from_sunday) != 0
    }

    fn wraps(&self) -> bool {
        self.end <= self.start && !(self.start == 0 && self.end == DAY_MINUTES)
    }

    fn allows(&self, t: NaiveDateTime) -> bool {
        let day = t.weekday().num_days_from_sunday();
        let minute = (t.hour() * 60 + t.minute()) as u16;
        if !self.wraps() {
            return self.has_day(day) && minute >= self.start && minute < self.end;
        }
        let yesterday = (day + 6) % 7;
        (self.has_day(day) && minute >= self.start) || (self.has_day(yesterday) && minute < self.end)
    }
}

/// A set of permitted sending windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    clauses: Vec<Clause>,
    source: String,
}

impl TimeOfDay {
    /// Unrestricted
    pub fn any() -> Self {
        Self {
            clauses: vec![Clause {
                days: ALL_DAYS,
                start: 0,
                end: DAY_MINUTES,
            }],
            source: "Any".to_string(),
        }
    }

    pub fn parse(spec: &str) -> Result<Self, TodError> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("never") {
            return Ok(Self {
                clauses: Vec::new(),
                source: "Never".to_string(),
            });
        }
        let clauses = spec
            .split(',')
            .map(|c| parse_clause(c.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            clauses,
            source: spec.to_string(),
        })
    }

    pub fn is_unrestricted(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| c.days == ALL_DAYS && c.start == 0 && c.end == DAY_MINUTES)
    }

    pub fn allows(&self, t: NaiveDateTime) -> bool {
        self.clauses.iter().any(|c| c.allows(t))
    }

    /// The earliest local time at or after `t` that falls in a window, or
    /// `None` when no window exists.
    pub fn next_allowed(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.allows(t) {
            return Some(t);
        }
        let mut best: Option<NaiveDateTime> = None;
        for clause in &self.clauses {
            for offset in 0..=7 {
                let date = t.date() + Duration::days(offset);
                if !clause.has_day(date.weekday().num_days_from_sunday()) {
                    continue;
                }
                let (hour, minute) = (u32::from(clause.start / 60), u32::from(clause.start % 60));
                let Some(start) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                    continue;
                };
                let candidate = date.and_time(start);
                if candidate > t && best.map_or(true, |b| candidate < b) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// [`TimeOfDay::next_allowed`] for a UTC instant, evaluated in `tz`
    pub fn next_allowed_in<Tz: TimeZone>(&self, t: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        let local = t.with_timezone(tz).naive_local();
        let next = self.next_allowed(local)?;
        if next == local {
            return Some(t);
        }
        match tz.from_local_datetime(&next).earliest() {
            Some(when) => Some(when.with_timezone(&Utc)),
            // Window start falls in a DST gap; the offset from now is still right
            None => Some(t + (next - local)),
        }
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.source
    }
}

fn day_bit(name: &str) -> Option<u8> {
    let idx = match name {
        "su" | "sun" => 0,
        "mo" | "mon" => 1,
        "tu" | "tue" => 2,
        "we" | "wed" => 3,
        "th" | "thu" => 4,
        "fr" | "fri" => 5,
        "sa" | "sat" => 6,
        _ => return None,
    };
    Some(1 << idx)
}

fn parse_clause(clause: &str) -> Result<Clause, TodError> {
    if clause.is_empty() {
        return Err(TodError::Empty);
    }
    let split = clause
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(clause.len());
    let (day_part, window) = clause.split_at(split);
    let day_part = day_part.to_ascii_lowercase();

    let mut days = 0u8;
    let mut rest = day_part.as_str();
    if rest.is_empty() {
        days = ALL_DAYS;
    }
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix("any") {
            days |= ALL_DAYS;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("wk") {
            days |= WEEKDAYS;
            rest = r;
        } else if let Some(bit) = rest.get(..3).and_then(day_bit) {
            days |= bit;
            rest = &rest[3..];
        } else if let Some(bit) = rest.get(..2).and_then(day_bit) {
            days |= bit;
            rest = &rest[2..];
        } else {
            return Err(TodError::BadDay(clause.to_string()));
        }
    }

    if window.is_empty() {
        return Ok(Clause {
            days,
            start: 0,
            end: DAY_MINUTES,
        });
    }
    let bad = || TodError::BadWindow(clause.to_string());
    let (from, to) = window.split_once('-').ok_or_else(bad)?;
    let start = hhmm(from).ok_or_else(bad)?;
    let end = hhmm(to).ok_or_else(bad)?;
    Ok(Clause { days, start, end })
}

fn hhmm(s: &str) -> Option<u16> {
    if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: u16 = s[..2].parse().ok()?;
    let minutes: u16 = s[2..].parse().ok()?;
    if hours > 24 || minutes > 59 || (hours == 24 && minutes != 0) {
        return None;
    }
    Some(hours * 60 + minutes)
}

#[cfg(test)]
#[path = "tod_tests.rs"]
mod tests;
