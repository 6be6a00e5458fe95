// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modem device lock adapters
//!
//! Modems are shared with modem servers and other dial-out programs through
//! advisory device locks. Acquisition never blocks: a held lock is reported
//! as `false` and the caller polls later.

mod uucp;

pub use uucp::UucpLockAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLockAdapter, LockCall};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Adapter for taking and releasing device locks
pub trait LockAdapter: Clone + Send + Sync + 'static {
    /// Try to lock `device`. `Ok(false)` means someone else holds it.
    fn acquire(&self, device: &str) -> Result<bool, LockError>;

    /// Release a lock previously acquired by this process
    fn release(&self, device: &str) -> Result<(), LockError>;

    /// Whether the device could be locked right now
    fn is_free(&self, device: &str) -> Result<bool, LockError>;
}
