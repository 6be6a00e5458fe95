// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batches: jobs sent to one destination in a single call

use chrono::{DateTime, Utc};
use fq_core::{FaxRequest, JobId, JobType};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u32);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

#[derive(Debug)]
pub struct Batch {
    pub id: BatchId,
    pub dest: String,
    pub modem: String,
    pub jobtype: JobType,
    /// Jobs in send order
    pub jobs: Vec<JobId>,
    /// Jobs whose preparation has not reported yet
    pub preparing: BTreeSet<JobId>,
    /// Send child, once started
    pub pid: Option<u32>,
    pub started: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: BatchId, dest: &str, modem: &str, jobtype: JobType, now: DateTime<Utc>) -> Self {
        Self {
            id,
            dest: dest.to_string(),
            modem: modem.to_string(),
            jobtype,
            jobs: Vec::new(),
            preparing: BTreeSet::new(),
            pid: None,
            started: now,
        }
    }

    pub fn remove(&mut self, id: &JobId) {
        self.jobs.retain(|j| j != id);
        self.preparing.remove(id);
    }

    /// Every job is prepared and no send is running yet
    pub fn ready_to_send(&self) -> bool {
        self.pid.is_none() && self.preparing.is_empty() && !self.jobs.is_empty()
    }
}

/// Decides which ready jobs may share a call with the batch's first job
pub trait BatchPolicy: Send {
    fn compatible(&self, lead: &FaxRequest, candidate: &FaxRequest) -> bool;
}

/// Fold fax jobs that ask for the same modem and session parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBatchPolicy;

impl BatchPolicy for DefaultBatchPolicy {
    fn compatible(&self, lead: &FaxRequest, candidate: &FaxRequest) -> bool {
        lead.jobtype == JobType::Facsimile
            && candidate.jobtype == JobType::Facsimile
            && lead.modem == candidate.modem
            && lead.resolution == candidate.resolution
            && lead.pagewidth == candidate.pagewidth
            && lead.pagelength == candidate.pagelength
            && lead.desiredbr == candidate.desiredbr
            && lead.desiredec == candidate.desiredec
            && lead.desireddf == candidate.desireddf
            && !lead.is_poll_only()
            && !candidate.is_poll_only()
    }
}

/// Never fold; one job per call
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleJobPolicy;

impl BatchPolicy for SingleJobPolicy {
    fn compatible(&self, _lead: &FaxRequest, _candidate: &FaxRequest) -> bool {
        false
    }
}
