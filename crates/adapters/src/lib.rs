// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the scheduler's external collaborators: child processes,
//! modem device locks, the notification hook and client FIFOs

pub mod fifo;
pub mod lock;
pub mod notify;
pub mod process;
pub mod traced;

pub use fifo::{FifoAdapter, FifoError, PipeFifoAdapter};
pub use lock::{LockAdapter, LockError, UucpLockAdapter};
pub use notify::{Notice, NotifyAdapter, NotifyError, NotifyReason, ScriptNotifyAdapter};
pub use process::{Child, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec, TokioProcessAdapter};
pub use traced::{TracedLockAdapter, TracedProcessAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fifo::{FakeFifoAdapter, FifoCall};
#[cfg(any(test, feature = "test-support"))]
pub use lock::{FakeLockAdapter, LockCall};
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifyAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeProcessAdapter, ProcessCall};
