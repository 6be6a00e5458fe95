// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command FIFO handling.

use fq_adapters::{FifoAdapter, LockAdapter, NotifyAdapter, ProcessAdapter};
use fq_core::{Ack, Clock, CommandError, CommandLine};
use fq_engine::QueueManager;
use thiserror::Error;
use tracing::{debug, warn};

/// Handle one line read from the scheduler FIFO.
///
/// The acknowledgement goes to the line's reply FIFO when one is named.
/// Returns `None` for blank lines.
pub async fn handle_line<P, L, N, F, C, R>(
    queue: &mut QueueManager<P, L, N, F, C>,
    replies: &R,
    line: &str,
) -> Result<Option<Ack>, ServerError>
where
    P: ProcessAdapter,
    L: LockAdapter,
    N: NotifyAdapter,
    F: FifoAdapter,
    C: Clock,
    R: FifoAdapter,
{
    let line = line.trim_end_matches(['\n', '\r', '\0']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    // Without an envelope there is nobody to tell about a bad line
    let parsed = CommandLine::parse(line)?;
    debug!(line, "Received command");

    let ack = match parsed.command() {
        Ok(cmd) => queue.handle_command(cmd, parsed.reply.as_deref()).await,
        Err(e) => {
            warn!(line, error = %e, "rejected command");
            Ack::Err(parsed.code)
        }
    };

    if let Some(reply) = &parsed.reply {
        if let Err(e) = replies.send(reply, &ack.to_bytes()).await {
            warn!(reply = %reply.display(), error = %e, "cannot acknowledge command");
        }
    }
    Ok(Some(ack))
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("malformed command: {0}")]
    Command(#[from] CommandError),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
