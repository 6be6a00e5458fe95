// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volatile job handle
//!
//! A [`Job`] mirrors the scheduling fields of a request record while the job
//! is known to the scheduler. The record stays authoritative: every change
//! made here is written back before the job can be forgotten.

use crate::batch::BatchId;
use chrono::{DateTime, Utc};
use fq_core::{from_epoch, FaxRequest, JobId, JobState, JobType};

/// Which list a job currently sits on. A job is on at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Held by a batch (preparing or sending)
    None,
    Ready,
    Sleeping,
    Blocked,
    Suspended,
    Dead,
}

/// User request that must wait for the job's current attempt to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Suspend,
    Remove,
    Kill,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Canonical destination
    pub dest: String,
    pub jobtype: JobType,
    pub pri: u8,
    pub state: JobState,
    pub tts: DateTime<Utc>,
    /// Zero means no deadline
    pub killtime: Option<DateTime<Utc>>,
    /// When the job was accepted; notifications report time since then
    pub start: DateTime<Utc>,
    pub slot: Slot,
    pub batch: Option<BatchId>,
    /// Modem assigned for the current attempt
    pub modem: Option<String>,
    /// Pid of the send or preparation child
    pub pid: Option<u32>,
    pub pending: Option<PendingAction>,
    /// Kill time passed during an attempt; fail once it ends
    pub expired: bool,
    /// Submitter was already told the job is blocked
    pub block_notified: bool,
}

impl Job {
    pub fn from_record(req: &FaxRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: req.jobid.clone(),
            dest: req.canonical.clone(),
            jobtype: req.jobtype,
            pri: req.pri,
            state: req.state,
            tts: if req.tts == 0 { now } else { from_epoch(req.tts) },
            killtime: (req.killtime != 0).then(|| from_epoch(req.killtime)),
            start: now,
            slot: Slot::None,
            batch: None,
            modem: None,
            pid: None,
            pending: None,
            expired: false,
            block_notified: false,
        }
    }

    /// Whether the job belongs to a batch that is preparing or sending
    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.killtime.is_some_and(|k| k <= now)
    }

    /// Copy the mutable scheduling fields of a re-read record
    pub fn refresh(&mut self, req: &FaxRequest, now: DateTime<Utc>) {
        self.pri = req.pri;
        self.jobtype = req.jobtype;
        self.tts = if req.tts == 0 { now } else { from_epoch(req.tts) };
        self.killtime = (req.killtime != 0).then(|| from_epoch(req.killtime));
    }
}
