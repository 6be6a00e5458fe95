// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification hook adapters
//!
//! The hook tells the submitter what happened to a job. It is run as
//! `<hook> <qfile> <reason> [<duration>] [<next-try>]` and never waited on
//! by the scheduler.

mod script;

pub use script::ScriptNotifyAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifyAdapter;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from notification operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("cannot run notification hook {hook}: {source}")]
    Spawn {
        hook: PathBuf,
        source: std::io::Error,
    },
}

/// Why the submitter is being told about a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyReason {
    Done,
    Failed,
    Requeued,
    Blocked,
    TimedOut,
    Rejected,
    Removed,
    Killed,
    FormatFailed,
    NoFormatter,
}

impl NotifyReason {
    pub fn name(self) -> &'static str {
        match self {
            NotifyReason::Done => "done",
            NotifyReason::Failed => "failed",
            NotifyReason::Requeued => "requeued",
            NotifyReason::Blocked => "blocked",
            NotifyReason::TimedOut => "timedout",
            NotifyReason::Rejected => "rejected",
            NotifyReason::Removed => "removed",
            NotifyReason::Killed => "killed",
            NotifyReason::FormatFailed => "format_failed",
            NotifyReason::NoFormatter => "no_formatter",
        }
    }

    /// Whether the reason ends the job
    pub fn is_terminal(self) -> bool {
        !matches!(self, NotifyReason::Requeued | NotifyReason::Blocked)
    }
}

impl fmt::Display for NotifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub hook: PathBuf,
    /// Spool-relative record path
    pub qfile: String,
    pub reason: NotifyReason,
    /// How long the job or the attempt took
    pub duration: Option<Duration>,
    /// Next send time (unix seconds) for requeued jobs
    pub next_tts: Option<i64>,
}

impl Notice {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.qfile.clone(), self.reason.name().to_string()];
        if let Some(d) = self.duration {
            args.push(d.as_secs().to_string());
        }
        if let Some(tts) = self.next_tts {
            if self.duration.is_none() {
                args.push("0".to_string());
            }
            args.push(tts.to_string());
        }
        args
    }
}

/// Adapter for telling submitters about their jobs
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}
