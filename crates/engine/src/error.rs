// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the queue manager

use fq_adapters::{LockError, ProcessError};
use fq_core::{ConfigError, JobId};
use fq_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while handling a command or completion
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("job not found: {0}")]
    UnknownJob(JobId),
    #[error("job {0} is already queued")]
    AlreadyQueued(JobId),
    #[error("job {id} cannot be changed while {state}")]
    InvalidState { id: JobId, state: fq_core::JobState },
    #[error("trigger {0} not found")]
    UnknownTrigger(u32),
    #[error("trigger table full")]
    TooManyTriggers,
    #[error("trigger needs a reply FIFO")]
    NoTriggerFifo,
    #[error("job {0} did not stop in time")]
    StopTimeout(JobId),
}
