// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fq-core: shared types for the fax queue scheduler
//!
//! This crate provides:
//! - The request record model and its text codec
//! - Job states and the outcome codes reported by child processes
//! - Time-of-day windows and dial-string canonicalization
//! - Command channel grammar and event framing
//! - Configuration with reload and runtime overrides

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod command;
pub mod config;
pub mod dial;
pub mod event;
pub mod id;
pub mod record;
pub mod state;
pub mod status;
pub mod tod;
pub mod trigger;

pub use clock::{delta, from_epoch, later, Clock, FakeClock, SystemClock};
pub use command::{Ack, Command, CommandError, CommandLine};
pub use config::{Config, ConfigError, ConfigSource, DestControls};
pub use dial::DialRules;
pub use event::{EventClass, EventCode, EventPayload, JobSnapshot, ModemSnapshot};
pub use id::SlotAllocator;
pub use record::{DocKind, DocOp, DoneOp, FaxRequest, JobId, OpKind, RecordError};
pub use state::{JobState, JobType, ModemState, NotifyWhen};
pub use status::{CallStatus, PrepStatus, SendOutcome, SendStatus};
pub use tod::TimeOfDay;
pub use trigger::TriggerSpec;
