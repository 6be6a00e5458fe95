// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events posted to trigger subscribers
//!
//! Every message is a fixed 24-byte big-endian header followed by `length`
//! payload bytes:
//!
//! ```text
//! magic u16 | reserved u16 | seq u32 | length u32 | code u32 | timestamp i64
//! ```

use crate::record::{FaxRequest, JobId};
use crate::state::{JobState, ModemState};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const EVENT_MAGIC: u16 = 0x4651;
pub const HEADER_LEN: usize = 24;

/// Event families a trigger can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventClass {
    Job = 1,
    Send = 2,
    Modem = 3,
}

impl EventClass {
    pub fn letter(self) -> char {
        match self {
            EventClass::Job => 'J',
            EventClass::Send => 'S',
            EventClass::Modem => 'M',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'J' => Some(EventClass::Job),
            'S' => Some(EventClass::Send),
            'M' => Some(EventClass::Modem),
            _ => None,
        }
    }
}

macro_rules! event_codes {
    ($($variant:ident => ($class:ident, $bit:expr, $name:literal),)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum EventCode {
            $($variant,)+
        }

        impl EventCode {
            pub const ALL: &'static [EventCode] = &[$(EventCode::$variant,)+];

            pub fn class(self) -> EventClass {
                match self {
                    $(EventCode::$variant => EventClass::$class,)+
                }
            }

            /// Bit position within the class mask
            pub fn bit(self) -> u32 {
                match self {
                    $(EventCode::$variant => $bit,)+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(EventCode::$variant => $name,)+
                }
            }
        }
    };
}

event_codes! {
    JobCreate => (Job, 0, "JOB_CREATE"),
    JobSuspend => (Job, 1, "JOB_SUSPEND"),
    JobReady => (Job, 2, "JOB_READY"),
    JobSleep => (Job, 3, "JOB_SLEEP"),
    JobAltered => (Job, 4, "JOB_ALTERED"),
    JobBlocked => (Job, 5, "JOB_BLOCKED"),
    JobReject => (Job, 6, "JOB_REJECT"),
    JobKill => (Job, 7, "JOB_KILL"),
    JobTimedout => (Job, 8, "JOB_TIMEDOUT"),
    JobPrepBegin => (Job, 9, "JOB_PREP_BEGIN"),
    JobPrepEnd => (Job, 10, "JOB_PREP_END"),
    JobActive => (Job, 11, "JOB_ACTIVE"),
    JobDone => (Job, 12, "JOB_DONE"),
    JobRequeue => (Job, 13, "JOB_REQUEUE"),
    JobRemove => (Job, 14, "JOB_REMOVE"),
    JobReap => (Job, 15, "JOB_REAP"),
    SendBegin => (Send, 0, "SEND_BEGIN"),
    SendEnd => (Send, 1, "SEND_END"),
    SendDone => (Send, 2, "SEND_DONE"),
    SendReformat => (Send, 3, "SEND_REFORMAT"),
    SendRequeue => (Send, 4, "SEND_REQUEUE"),
    SendFailed => (Send, 5, "SEND_FAILED"),
    ModemAssign => (Modem, 0, "MODEM_ASSIGN"),
    ModemRelease => (Modem, 1, "MODEM_RELEASE"),
    ModemDown => (Modem, 2, "MODEM_DOWN"),
    ModemReady => (Modem, 3, "MODEM_READY"),
    ModemBusy => (Modem, 4, "MODEM_BUSY"),
    ModemLocked => (Modem, 5, "MODEM_LOCKED"),
}

impl EventCode {
    /// Single-bit mask of this code within its class
    pub fn mask(self) -> u32 {
        1 << self.bit()
    }

    /// Wire value: class in the high half, bit position in the low half
    pub fn code(self) -> u32 {
        ((self.class() as u32) << 16) | self.bit()
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("event frame too short: {0} bytes")]
    Short(usize),
    #[error("bad event magic {0:#06x}")]
    BadMagic(u16),
    #[error("payload length {declared} exceeds {available} available bytes")]
    Truncated { declared: u32, available: usize },
}

/// Fixed header preceding every event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub seq: u32,
    pub length: u32,
    pub code: u32,
    /// Unix seconds
    pub timestamp: i64,
}

impl EventHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&EVENT_MAGIC.to_be_bytes());
        // bytes 2..4 reserved
        buf[4..8].copy_from_slice(&self.seq.to_be_bytes());
        buf[8..12].copy_from_slice(&self.length.to_be_bytes());
        buf[12..16].copy_from_slice(&self.code.to_be_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let Some(header) = buf.get(..HEADER_LEN) else {
            return Err(FrameError::Short(buf.len()));
        };
        let magic = u16::from_be_bytes([header[0], header[1]]);
        if magic != EVENT_MAGIC {
            return Err(FrameError::BadMagic(magic));
        }
        let word = |at: usize| u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&header[16..24]);
        Ok(Self {
            seq: word(4),
            length: word(8),
            code: word(12),
            timestamp: i64::from_be_bytes(ts),
        })
    }
}

/// Job fields reported with job and send events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub jobid: JobId,
    pub state: JobState,
    pub dest: String,
    pub modem: String,
    pub pri: u8,
    pub tts: i64,
    pub killtime: i64,
    pub ntries: u16,
    pub ndials: u16,
    pub npages: u16,
    pub totpages: u16,
    pub status: String,
}

impl From<&FaxRequest> for JobSnapshot {
    fn from(req: &FaxRequest) -> Self {
        Self {
            jobid: req.jobid.clone(),
            state: req.state,
            dest: req.canonical.clone(),
            modem: req.modem.clone(),
            pri: req.pri,
            tts: req.tts,
            killtime: req.killtime,
            ntries: req.ntries,
            ndials: req.ndials,
            npages: req.npages,
            totpages: req.totpages,
            status: req.status.clone(),
        }
    }
}

/// Modem fields reported with modem events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemSnapshot {
    pub id: String,
    pub state: ModemState,
    pub groups: Vec<String>,
    /// Job whose batch currently holds the modem
    pub job: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Job(JobSnapshot),
    Modem(ModemSnapshot),
    Text(String),
}

impl EventPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            // Plain data structs; serialization cannot fail
            EventPayload::Job(job) => serde_json::to_vec(job).unwrap_or_default(),
            EventPayload::Modem(modem) => serde_json::to_vec(modem).unwrap_or_default(),
            EventPayload::Text(text) => text.as_bytes().to_vec(),
        }
    }

    /// Id that trigger filters compare against
    pub fn subject(&self) -> &str {
        match self {
            EventPayload::Job(job) => job.jobid.as_str(),
            EventPayload::Modem(modem) => &modem.id,
            EventPayload::Text(_) => "",
        }
    }
}

/// Frame one event for delivery
pub fn encode_event(seq: u32, code: EventCode, timestamp: i64, payload: &EventPayload) -> Vec<u8> {
    let body = payload.to_bytes();
    let header = EventHeader {
        seq,
        length: body.len() as u32,
        code: code.code(),
        timestamp,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&body);
    out
}

/// Split a received frame into header and payload bytes
pub fn decode_event(buf: &[u8]) -> Result<(EventHeader, &[u8]), FrameError> {
    let header = EventHeader::decode(buf)?;
    let body = &buf[HEADER_LEN..];
    let len = header.length as usize;
    if body.len() < len {
        return Err(FrameError::Truncated {
            declared: header.length,
            available: body.len(),
        });
    }
    Ok((header, &body[..len]))
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
