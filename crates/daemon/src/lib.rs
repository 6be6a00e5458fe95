// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! faxqd internals: spool lifecycle and the command FIFO server

pub mod lifecycle;
pub mod server;

pub use lifecycle::{startup, Config, DaemonState, LifecycleError};
pub use server::{handle_line, ServerError};
