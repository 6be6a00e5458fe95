// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notification adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Notice, NotifyAdapter, NotifyError, NotifyReason};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Fake notification adapter for testing
#[derive(Clone, Default)]
pub struct FakeNotifyAdapter {
    calls: Arc<Mutex<Vec<Notice>>>,
}

impl FakeNotifyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded notifications
    pub fn calls(&self) -> Vec<Notice> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reasons notified for one record, in order
    pub fn reasons_for(&self, qfile: &str) -> Vec<NotifyReason> {
        self.calls()
            .into_iter()
            .filter(|n| n.qfile == qfile)
            .map(|n| n.reason)
            .collect()
    }
}

#[async_trait]
impl NotifyAdapter for FakeNotifyAdapter {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
