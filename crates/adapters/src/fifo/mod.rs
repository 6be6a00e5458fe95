// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client FIFO delivery
//!
//! Command acknowledgements and trigger events go to FIFOs that clients
//! create and read. A FIFO with no reader is a client that went away.

mod pipe;

pub use pipe::PipeFifoAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFifoAdapter, FifoCall};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FifoError {
    #[error("no reader on {0}")]
    NoReader(PathBuf),
    #[error("timed out writing to {0}")]
    Timeout(PathBuf),
    #[error("writing to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FifoError {
    /// The client is gone and will never read again
    pub fn is_gone(&self) -> bool {
        matches!(self, FifoError::NoReader(_))
    }
}

/// Adapter for writing one message to a client FIFO
#[async_trait]
pub trait FifoAdapter: Clone + Send + Sync + 'static {
    async fn send(&self, path: &Path, bytes: &[u8]) -> Result<(), FifoError>;
}
