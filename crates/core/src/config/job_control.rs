// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination job control rules
//!
//! Rules are tried in order against the canonical destination; for each
//! setting the first matching rule that sets it wins, falling back to the
//! global configuration.

use super::Config;
use crate::tod::TimeOfDay;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A regular expression that deserializes from a string
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl Serialize for Pattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pattern::new(&s).map_err(serde::de::Error::custom)
    }
}

/// One `[[job_control]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobControlRule {
    /// Matched against the canonical destination number
    pub dest: Pattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_calls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dials: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_send_pages: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    /// Force jobs to this modem or modem group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modem: Option<String>,
    /// When set, jobs to the destination are rejected with this reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_notice: Option<String>,
}

/// Effective limits for one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestControls {
    pub max_concurrent_calls: u32,
    pub max_dials: u16,
    pub max_tries: u16,
    pub max_send_pages: u16,
    pub time_of_day: TimeOfDay,
    pub modem: Option<String>,
    pub reject_notice: Option<String>,
}

impl DestControls {
    pub(super) fn resolve(config: &Config, dest: &str) -> Self {
        let matching: Vec<&JobControlRule> = config
            .job_control
            .iter()
            .filter(|r| r.dest.is_match(dest))
            .collect();

        Self {
            max_concurrent_calls: matching
                .iter()
                .find_map(|r| r.max_concurrent_calls)
                .unwrap_or(config.max_concurrent_calls),
            max_dials: matching
                .iter()
                .find_map(|r| r.max_dials)
                .unwrap_or(config.max_dials),
            max_tries: matching
                .iter()
                .find_map(|r| r.max_tries)
                .unwrap_or(config.max_tries),
            max_send_pages: matching
                .iter()
                .find_map(|r| r.max_send_pages)
                .unwrap_or(config.max_send_pages),
            time_of_day: matching
                .iter()
                .find_map(|r| r.time_of_day.clone())
                .unwrap_or_else(|| config.time_of_day.clone()),
            modem: matching.iter().find_map(|r| r.modem.clone()),
            reject_notice: matching.iter().find_map(|r| r.reject_notice.clone()),
        }
    }
}
