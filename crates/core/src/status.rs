// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome codes reported by child processes
//!
//! Send commands pack their outcome into the exit code: the low byte is a
//! [`SendStatus`], the high byte a [`CallStatus`]. Converters only report
//! success or failure; the preparation stage turns that into a [`PrepStatus`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one send attempt for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    /// Everything was transmitted
    Done = 0,
    /// Transient failure, try again later
    Retry = 1,
    /// Permanent failure
    Failed = 2,
    /// Remote needs different session parameters; re-image and retry
    Reformat = 3,
    /// The batch was aborted before this job was attempted
    BatchFail = 4,
}

impl SendStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SendStatus::Done),
            1 => Some(SendStatus::Retry),
            2 => Some(SendStatus::Failed),
            3 => Some(SendStatus::Reformat),
            4 => Some(SendStatus::BatchFail),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// How the call itself went, used to pick a requeue delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ok = 0,
    Busy = 1,
    NoCarrier = 2,
    NoAnswer = 3,
    NoDialtone = 4,
    /// Fax protocol error after the call was answered
    Error = 5,
    /// Anything else (modem trouble, aborted call)
    Failure = 6,
}

impl CallStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CallStatus::Ok),
            1 => Some(CallStatus::Busy),
            2 => Some(CallStatus::NoCarrier),
            3 => Some(CallStatus::NoAnswer),
            4 => Some(CallStatus::NoDialtone),
            5 => Some(CallStatus::Error),
            6 => Some(CallStatus::Failure),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the call was answered, so the attempt counts as a try rather
    /// than only a dial
    pub fn answered(self) -> bool {
        matches!(self, CallStatus::Ok | CallStatus::Error)
    }

    pub fn name(self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Busy => "busy",
            CallStatus::NoCarrier => "no carrier",
            CallStatus::NoAnswer => "no answer",
            CallStatus::NoDialtone => "no dial tone",
            CallStatus::Error => "protocol error",
            CallStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded result of a send subprocess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub status: SendStatus,
    pub call: CallStatus,
}

impl SendOutcome {
    /// Decode a process exit code. `None` means the process died on a signal,
    /// which is treated like an unexplained transient failure.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        let Some(code) = code else {
            return Self::abnormal();
        };
        let low = (code & 0xff) as u8;
        let high = ((code >> 8) & 0xff) as u8;
        match (SendStatus::from_code(low), CallStatus::from_code(high)) {
            (Some(status), Some(call)) => Self { status, call },
            (Some(status), None) => Self {
                status,
                call: CallStatus::Failure,
            },
            _ => Self::abnormal(),
        }
    }

    /// Inverse of [`SendOutcome::from_exit_code`]
    pub fn exit_code(self) -> i32 {
        (i32::from(self.call.code()) << 8) | i32::from(self.status.code())
    }

    fn abnormal() -> Self {
        Self {
            status: SendStatus::Retry,
            call: CallStatus::Failure,
        }
    }
}

/// Result of preparing one job for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepStatus {
    /// Ready to send
    Done,
    /// Policy violation; the job must not be sent
    Rejected(String),
    /// A converter ran and failed on the document
    FormatFailed(String),
    /// No converter is configured or installed for a document type
    NoFormatter(String),
    /// Local trouble (fork, disk); try again later without penalty
    Retry(String),
    /// The job was pulled out of the batch and goes back to its queue
    Requeued,
}

impl PrepStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, PrepStatus::Done)
    }

    pub fn message(&self) -> &str {
        match self {
            PrepStatus::Done => "",
            PrepStatus::Requeued => "Job requeued",
            PrepStatus::Rejected(m)
            | PrepStatus::FormatFailed(m)
            | PrepStatus::NoFormatter(m)
            | PrepStatus::Retry(m) => m,
        }
    }
}
