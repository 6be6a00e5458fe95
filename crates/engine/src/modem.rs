// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modem registry and assignment constraints

use crate::batch::BatchId;
use fq_core::config::Pattern;
use fq_core::{JobId, ModemSnapshot, ModemState};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Modem {
    pub id: String,
    pub state: ModemState,
    /// Groups the modem server reported membership of
    pub groups: BTreeSet<String>,
    pub batch: Option<BatchId>,
    /// Job leading the batch that holds the modem
    pub job: Option<JobId>,
}

impl Modem {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: ModemState::Down,
            groups: BTreeSet::new(),
            batch: None,
            job: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == ModemState::Ready && self.batch.is_none()
    }

    pub fn snapshot(&self) -> ModemSnapshot {
        ModemSnapshot {
            id: self.id.clone(),
            state: self.state,
            groups: self.groups.iter().cloned().collect(),
            job: self.job.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ModemRegistry {
    modems: BTreeMap<String, Modem>,
}

impl ModemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status report. Returns true when the state changed.
    pub fn update(&mut self, id: &str, state: ModemState, group: Option<&str>) -> bool {
        let modem = self
            .modems
            .entry(id.to_string())
            .or_insert_with(|| Modem::new(id));
        if let Some(group) = group {
            modem.groups.insert(group.to_string());
        }
        let changed = modem.state != state;
        modem.state = state;
        changed
    }

    pub fn get(&self, id: &str) -> Option<&Modem> {
        self.modems.get(id)
    }

    pub fn any_available(&self) -> bool {
        self.modems.values().any(Modem::is_available)
    }

    /// Available modems satisfying `constraint`: `any` (or empty), a modem
    /// id, or the name of a modem group
    pub fn candidates(&self, constraint: &str, groups: &BTreeMap<String, Pattern>) -> Vec<String> {
        self.modems
            .values()
            .filter(|m| m.is_available() && matches(m, constraint, groups))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Whether `constraint` names anything a job could be assigned to: `any`,
    /// a modem seen so far, or a reported or configured group
    pub fn knows(&self, constraint: &str, groups: &BTreeMap<String, Pattern>) -> bool {
        is_any(constraint)
            || self.modems.contains_key(constraint)
            || groups.contains_key(constraint)
            || self.modems.values().any(|m| m.groups.contains(constraint))
    }

    pub fn assign(&mut self, id: &str, batch: BatchId, job: &JobId) {
        if let Some(m) = self.modems.get_mut(id) {
            m.batch = Some(batch);
            m.job = Some(job.clone());
        }
    }

    /// Free a modem held by a batch
    pub fn release(&mut self, id: &str) {
        if let Some(m) = self.modems.get_mut(id) {
            m.batch = None;
            m.job = None;
        }
    }

    pub fn set_state(&mut self, id: &str, state: ModemState) {
        if let Some(m) = self.modems.get_mut(id) {
            m.state = state;
        }
    }
}

fn is_any(constraint: &str) -> bool {
    constraint.is_empty() || constraint.eq_ignore_ascii_case("any")
}

fn matches(modem: &Modem, constraint: &str, groups: &BTreeMap<String, Pattern>) -> bool {
    if is_any(constraint) || modem.id == constraint {
        return true;
    }
    if modem.groups.contains(constraint) {
        return true;
    }
    groups
        .get(constraint)
        .is_some_and(|pattern| pattern.is_match(&modem.id))
}
