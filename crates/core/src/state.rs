// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job scheduling states and the small enumerations persisted with a job

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling state of a job.
///
/// ```text
/// suspended -> pending -> sleeping <-> ready -> active -> {done | failed}
///                                      ready <-> blocked
/// ```
///
/// Numeric codes are what the request record stores in its `state` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Suspended = 1,
    Pending = 2,
    Sleeping = 3,
    Blocked = 4,
    Ready = 5,
    Active = 6,
    Done = 7,
    Failed = 8,
}

impl JobState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(JobState::Suspended),
            2 => Some(JobState::Pending),
            3 => Some(JobState::Sleeping),
            4 => Some(JobState::Blocked),
            5 => Some(JobState::Ready),
            6 => Some(JobState::Active),
            7 => Some(JobState::Done),
            8 => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            JobState::Suspended => "suspended",
            JobState::Pending => "pending",
            JobState::Sleeping => "sleeping",
            JobState::Blocked => "blocked",
            JobState::Ready => "ready",
            JobState::Active => "active",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of transmission a job performs; selects the send command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Facsimile,
    Pager,
    Uucp,
}

impl JobType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "facsimile" | "fax" => Some(JobType::Facsimile),
            "pager" => Some(JobType::Pager),
            "uucp" => Some(JobType::Uucp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JobType::Facsimile => "facsimile",
            JobType::Pager => "pager",
            JobType::Uucp => "uucp",
        }
    }
}

/// Which transitions the submitter asked to be told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyWhen {
    #[default]
    None,
    Done,
    Requeue,
    DoneAndRequeue,
}

impl NotifyWhen {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(NotifyWhen::None),
            "done" | "when done" => Some(NotifyWhen::Done),
            "requeue" | "when requeued" => Some(NotifyWhen::Requeue),
            "done+requeue" | "when done+requeued" => Some(NotifyWhen::DoneAndRequeue),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NotifyWhen::None => "none",
            NotifyWhen::Done => "done",
            NotifyWhen::Requeue => "requeue",
            NotifyWhen::DoneAndRequeue => "done+requeue",
        }
    }

    pub fn on_done(self) -> bool {
        matches!(self, NotifyWhen::Done | NotifyWhen::DoneAndRequeue)
    }

    pub fn on_requeue(self) -> bool {
        matches!(self, NotifyWhen::Requeue | NotifyWhen::DoneAndRequeue)
    }
}

/// Availability of a modem as reported by its modem server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModemState {
    #[default]
    Down,
    Busy,
    Ready,
}

impl ModemState {
    /// Parse the single-letter status of a modem status command
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(ModemState::Ready),
            'B' => Some(ModemState::Busy),
            'D' => Some(ModemState::Down),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ModemState::Ready => 'R',
            ModemState::Busy => 'B',
            ModemState::Down => 'D',
        }
    }
}
