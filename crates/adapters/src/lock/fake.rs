// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake lock adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LockAdapter, LockError};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Recorded lock operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCall {
    Acquire { device: String, granted: bool },
    Release { device: String },
}

#[derive(Default)]
struct LockState {
    ours: BTreeSet<String>,
    /// Devices locked by some other program
    foreign: BTreeSet<String>,
    calls: Vec<LockCall>,
}

#[derive(Clone, Default)]
pub struct FakeLockAdapter {
    inner: Arc<Mutex<LockState>>,
}

impl FakeLockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate another program holding (or dropping) the device
    pub fn set_foreign(&self, device: &str, held: bool) {
        let mut state = self.state();
        if held {
            state.foreign.insert(device.to_string());
        } else {
            state.foreign.remove(device);
        }
    }

    pub fn held(&self) -> Vec<String> {
        self.state().ours.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<LockCall> {
        self.state().calls.clone()
    }
}

impl LockAdapter for FakeLockAdapter {
    fn acquire(&self, device: &str) -> Result<bool, LockError> {
        let mut state = self.state();
        let granted = !state.foreign.contains(device);
        if granted {
            state.ours.insert(device.to_string());
        }
        state.calls.push(LockCall::Acquire {
            device: device.to_string(),
            granted,
        });
        Ok(granted)
    }

    fn release(&self, device: &str) -> Result<(), LockError> {
        let mut state = self.state();
        state.ours.remove(device);
        state.calls.push(LockCall::Release {
            device: device.to_string(),
        });
        Ok(())
    }

    fn is_free(&self, device: &str) -> Result<bool, LockError> {
        Ok(!self.state().foreign.contains(device))
    }
}
