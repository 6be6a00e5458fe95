// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Fax queue scheduler engine

pub mod batch;
pub mod dest;
mod error;
pub mod imager;
pub mod job;
pub mod modem;
pub mod prepare;
mod queue_manager;
mod supervisor;
pub mod timers;
mod triggers;

pub use batch::{BatchId, BatchPolicy, DefaultBatchPolicy, SingleJobPolicy};
pub use error::EngineError;
pub use job::{Job, PendingAction, Slot};
pub use queue_manager::{QueueDeps, QueueManager};
pub use supervisor::Completion;
pub use triggers::MAX_TRIGGERS;
