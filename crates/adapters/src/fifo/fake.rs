// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake FIFO adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{FifoAdapter, FifoError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Recorded FIFO write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoCall {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct FifoState {
    calls: Vec<FifoCall>,
    gone: BTreeSet<PathBuf>,
}

#[derive(Clone, Default)]
pub struct FakeFifoAdapter {
    inner: Arc<Mutex<FifoState>>,
}

impl FakeFifoAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FifoState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate a client whose reader closed
    pub fn close(&self, path: impl Into<PathBuf>) {
        self.state().gone.insert(path.into());
    }

    pub fn calls(&self) -> Vec<FifoCall> {
        self.state().calls.clone()
    }

    /// Messages delivered to one FIFO
    pub fn sent_to(&self, path: &Path) -> Vec<Vec<u8>> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.path == path)
            .map(|c| c.bytes.clone())
            .collect()
    }
}

#[async_trait]
impl FifoAdapter for FakeFifoAdapter {
    async fn send(&self, path: &Path, bytes: &[u8]) -> Result<(), FifoError> {
        let mut state = self.state();
        if state.gone.contains(path) {
            return Err(FifoError::NoReader(path.to_path_buf()));
        }
        state.calls.push(FifoCall {
            path: path.to_path_buf(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}
