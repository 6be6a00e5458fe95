// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination queues
//!
//! Jobs are referenced by id; the job table owns the jobs themselves.

use chrono::{DateTime, Utc};
use fq_core::JobId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadyEntry {
    pri: u8,
    /// Insertion order, keeps equal priorities FIFO
    seq: u64,
    id: JobId,
}

/// Everything queued for one canonical destination
#[derive(Debug, Default)]
pub struct DestQueue {
    ready: Vec<ReadyEntry>,
    sleeping: Vec<(DateTime<Utc>, JobId)>,
    blocked: Vec<JobId>,
    /// Calls in progress to this destination
    pub active: u32,
    /// What earlier calls learned about the remote fax machine
    pub caps: BTreeMap<String, String>,
}

impl DestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert in priority order, behind jobs of equal priority
    pub fn push_ready(&mut self, id: JobId, pri: u8, seq: u64) {
        let pos = self
            .ready
            .partition_point(|e| (e.pri, e.seq) <= (pri, seq));
        self.ready.insert(pos, ReadyEntry { pri, seq, id });
    }

    /// Insert in send-time order
    pub fn push_sleeping(&mut self, id: JobId, tts: DateTime<Utc>) {
        let pos = self.sleeping.partition_point(|(t, _)| *t <= tts);
        self.sleeping.insert(pos, (tts, id));
    }

    pub fn push_blocked(&mut self, id: JobId) {
        self.blocked.push(id);
    }

    /// Remove a job from whichever sub-queue holds it
    pub fn remove(&mut self, id: &JobId) -> bool {
        if let Some(pos) = self.ready.iter().position(|e| &e.id == id) {
            self.ready.remove(pos);
            return true;
        }
        if let Some(pos) = self.sleeping.iter().position(|(_, j)| j == id) {
            self.sleeping.remove(pos);
            return true;
        }
        if let Some(pos) = self.blocked.iter().position(|j| j == id) {
            self.blocked.remove(pos);
            return true;
        }
        false
    }

    pub fn head(&self) -> Option<&JobId> {
        self.ready.first().map(|e| &e.id)
    }

    pub fn head_priority(&self) -> Option<u8> {
        self.ready.first().map(|e| e.pri)
    }

    /// Ready jobs after the head, in order
    pub fn ready_after_head(&self) -> impl Iterator<Item = &JobId> {
        self.ready.iter().skip(1).map(|e| &e.id)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn sleeping_len(&self) -> usize {
        self.sleeping.len()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    /// Take every blocked job, oldest first
    pub fn take_blocked(&mut self) -> Vec<JobId> {
        std::mem::take(&mut self.blocked)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.ready.iter().any(|e| &e.id == id)
            || self.sleeping.iter().any(|(_, j)| j == id)
            || self.blocked.iter().any(|j| j == id)
    }

    /// Nothing queued and no call in progress
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.sleeping.is_empty() && self.blocked.is_empty() && self.active == 0
    }

    /// Whether one more call fits under `max` simultaneous calls. Jobs
    /// waiting to retry count against the limit.
    pub fn admits_call(&self, max: u32) -> bool {
        self.active as usize + self.sleeping.len() < max as usize
    }
}

/// Destinations with ready work, ordered by head priority. Destinations of
/// equal priority are served round robin: a destination is re-inserted
/// behind its peers whenever its head changes.
#[derive(Debug, Default)]
pub struct RunQueue {
    order: Vec<(u8, String)>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `dest` at its priority position, or drop it when `pri` is None
    pub fn reposition(&mut self, dest: &str, pri: Option<u8>) {
        self.remove(dest);
        if let Some(pri) = pri {
            let pos = self.order.partition_point(|(p, _)| *p <= pri);
            self.order.insert(pos, (pri, dest.to_string()));
        }
    }

    pub fn remove(&mut self, dest: &str) {
        self.order.retain(|(_, d)| d != dest);
    }

    pub fn contains(&self, dest: &str) -> bool {
        self.order.iter().any(|(_, d)| d == dest)
    }

    /// Snapshot of the current order
    pub fn destinations(&self) -> Vec<String> {
        self.order.iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[path = "dest_tests.rs"]
mod tests;
