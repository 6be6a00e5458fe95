// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timers for send times, kill times and lock polls, plus scheduler pass
//! coalescing

use chrono::{DateTime, TimeDelta, Utc};
use fq_core::JobId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// What a timer is for. Each key has at most one live deadline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Sleeping or pending job reaches its send time
    Tts(JobId),
    /// Job reaches its kill time
    Kill(JobId),
    /// Retest a busy modem's device lock
    LockPoll(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    fire_at: DateTime<Utc>,
    key: TimerKey,
    generation: u64,
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first
        Reverse(self.fire_at)
            .cmp(&Reverse(other.fire_at))
            .then_with(|| other.key.cmp(&self.key))
    }
}

/// Deadline heap. Re-arming or cancelling a key bumps its generation, so
/// stale heap entries are skipped when they surface.
#[derive(Debug, Default)]
pub struct Timers {
    heap: BinaryHeap<Entry>,
    live: HashMap<TimerKey, u64>,
    generation: u64,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `fire_at`, replacing any earlier arming
    pub fn set(&mut self, key: TimerKey, fire_at: DateTime<Utc>) {
        self.generation += 1;
        self.live.insert(key.clone(), self.generation);
        self.heap.push(Entry {
            fire_at,
            key,
            generation: self.generation,
        });
    }

    pub fn cancel(&mut self, key: &TimerKey) {
        self.live.remove(key);
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.live.contains_key(key)
    }

    /// Earliest live deadline
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        while let Some(entry) = self.heap.peek() {
            if self.live.get(&entry.key) == Some(&entry.generation) {
                return Some(entry.fire_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Keys whose deadline is at or before `now`, earliest first
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<TimerKey> {
        let mut fired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.fire_at > now {
                break;
            }
            let Some(entry) = self.heap.pop() else {
                break;
            };
            if self.live.get(&entry.key) == Some(&entry.generation) {
                self.live.remove(&entry.key);
                fired.push(entry.key);
            }
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Coalesces scheduler pass requests: at most one pass per interval, and a
/// request made during or right after a pass always gets a trailing pass.
#[derive(Debug)]
pub struct PassTrigger {
    interval: TimeDelta,
    last: Option<DateTime<Utc>>,
    scheduled: Option<DateTime<Utc>>,
}

impl Default for PassTrigger {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(1))
    }
}

impl PassTrigger {
    pub fn new(interval: TimeDelta) -> Self {
        Self {
            interval,
            last: None,
            scheduled: None,
        }
    }

    /// Ask for a pass; returns when it will run
    pub fn request(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let earliest = match self.last {
            Some(last) => now.max(last + self.interval),
            None => now,
        };
        match self.scheduled {
            Some(at) if at <= earliest => at,
            _ => {
                self.scheduled = Some(earliest);
                earliest
            }
        }
    }

    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.scheduled
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled.is_some_and(|at| at <= now)
    }

    /// A pass started at `now`
    pub fn ran(&mut self, now: DateTime<Utc>) {
        self.last = Some(now);
        self.scheduled = None;
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
