// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO writes through tokio's non-blocking pipe sender

use super::{FifoAdapter, FifoError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;

#[derive(Clone, Debug)]
pub struct PipeFifoAdapter {
    timeout: Duration,
}

impl PipeFifoAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PipeFifoAdapter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl FifoAdapter for PipeFifoAdapter {
    async fn send(&self, path: &Path, bytes: &[u8]) -> Result<(), FifoError> {
        let mut sender = match pipe::OpenOptions::new().open_sender(path) {
            Ok(sender) => sender,
            Err(e) if e.raw_os_error() == Some(nix::libc::ENXIO) => {
                return Err(FifoError::NoReader(path.to_path_buf()))
            }
            Err(source) => {
                return Err(FifoError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        match tokio::time::timeout(self.timeout, sender.write_all(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(FifoError::NoReader(path.to_path_buf()))
            }
            Ok(Err(source)) => Err(FifoError::Io {
                path: path.to_path_buf(),
                source,
            }),
            Err(_) => Err(FifoError::Timeout(path.to_path_buf())),
        }
    }
}
