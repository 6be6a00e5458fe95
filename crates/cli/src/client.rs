// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command FIFO client for CLI commands

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fq_core::{Ack, Command, CommandError, CommandLine};
use fq_storage::Spool;
use nix::sys::stat::Mode;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;

// Timeout configuration (env var in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for the scheduler's acknowledgement
pub fn timeout_ack() -> Duration {
    parse_duration_ms("FAXCTL_TIMEOUT_ACK_MS").unwrap_or(Duration::from_secs(10))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Spool not found: {0}")]
    SpoolNotFound(PathBuf),

    #[error("Scheduler not running (nobody reads {0})")]
    NotRunning(PathBuf),

    #[error("Invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("Command arguments must fit on one line")]
    MultiLine,

    #[error("Reply FIFO path {0} cannot be used in a command line")]
    BadReplyPath(PathBuf),

    #[error("Failed to create reply FIFO {0}: {1}")]
    Mkfifo(PathBuf, nix::Error),

    #[error("Timed out waiting for the scheduler to acknowledge")]
    AckTimeout,

    #[error("Unreadable acknowledgement {0:?}")]
    BadAck(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes command lines to a spool's scheduler FIFO
pub struct FifoClient {
    spool: Spool,
}

impl FifoClient {
    pub fn open(root: &Path) -> Result<Self, ClientError> {
        // The daemon resolves reply paths from its own directory
        let root =
            std::fs::canonicalize(root).map_err(|_| ClientError::SpoolNotFound(root.to_path_buf()))?;
        Ok(Self {
            spool: Spool::new(root),
        })
    }

    /// Send a command without waiting for its outcome
    pub async fn send(&self, command: &Command) -> Result<(), ClientError> {
        self.write_line(&command.to_line(None)).await
    }

    /// Send a command and wait for the scheduler's acknowledgement
    pub async fn request(&self, command: &Command) -> Result<Ack, ClientError> {
        let reply = ReplyFifo::create(&self.spool)?;
        let address = reply
            .path
            .to_str()
            .filter(|p| !p.contains(':'))
            .ok_or_else(|| ClientError::BadReplyPath(reply.path.clone()))?;

        // Read-write so the open succeeds before the daemon connects
        let mut receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&reply.path)?;
        self.write_line(&command.to_line(Some(address))).await?;

        let bytes = tokio::time::timeout(timeout_ack(), read_ack(&mut receiver))
            .await
            .map_err(|_| ClientError::AckTimeout)??;
        Ack::parse(&bytes)
            .ok_or_else(|| ClientError::BadAck(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn write_line(&self, line: &str) -> Result<(), ClientError> {
        // The daemon silently drops lines it cannot parse
        if line.trim_end_matches('\n').contains(['\n', '\0']) {
            return Err(ClientError::MultiLine);
        }
        CommandLine::parse(line)?.command()?;

        let fifo = self.spool.fifo();
        let mut sender = match pipe::OpenOptions::new().open_sender(&fifo) {
            Ok(sender) => sender,
            Err(e)
                if e.kind() == ErrorKind::NotFound
                    || e.raw_os_error() == Some(nix::libc::ENXIO) =>
            {
                return Err(ClientError::NotRunning(fifo));
            }
            Err(e) => return Err(e.into()),
        };
        sender.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Read one NUL-terminated acknowledgement
async fn read_ack(receiver: &mut pipe::Receiver) -> Result<Vec<u8>, ClientError> {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = receiver.read(&mut buf).await?;
        if n == 0 {
            return Ok(bytes);
        }
        bytes.extend_from_slice(&buf[..n]);
        if let Some(end) = bytes.iter().position(|b| *b == 0) {
            bytes.truncate(end + 1);
            return Ok(bytes);
        }
    }
}

/// Per-process reply FIFO under the spool's tmp/, removed on drop
struct ReplyFifo {
    path: PathBuf,
}

impl ReplyFifo {
    fn create(spool: &Spool) -> Result<Self, ClientError> {
        let dir = spool.tmp();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("faxctl.{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        nix::unistd::mkfifo(&path, Mode::from_bits_truncate(0o622))
            .map_err(|e| ClientError::Mkfifo(path.clone(), e))?;
        Ok(Self { path })
    }
}

impl Drop for ReplyFifo {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
