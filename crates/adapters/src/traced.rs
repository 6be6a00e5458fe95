// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::lock::{LockAdapter, LockError};
use crate::process::{Child, ProcessAdapter, ProcessError, ProcessSpec};
use tracing::Instrument;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcessAdapter<P> {
    inner: P,
}

impl<P> TracedProcessAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: ProcessAdapter> ProcessAdapter for TracedProcessAdapter<P> {
    fn spawn(&self, spec: &ProcessSpec) -> Result<Child, ProcessError> {
        let program = spec.name();
        let span = tracing::info_span!("process.spawn", program, cwd = %spec.cwd.display());
        let _guard = span.enter();

        tracing::info!(args = ?spec.args, "starting");

        // Precondition: cwd must exist
        if !spec.cwd.is_dir() {
            tracing::error!("working directory does not exist");
            return Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory does not exist: {}", spec.cwd.display()),
                ),
            });
        }

        let start = std::time::Instant::now();
        let result = self.inner.spawn(spec);
        match result {
            Ok(child) => {
                let pid = child.pid;
                tracing::info!(pid, "started");
                let exit = child.exit;
                let exit = Box::pin(
                    async move {
                        let output = exit.await;
                        tracing::info!(
                            code = ?output.code,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "exited"
                        );
                        output
                    }
                    .instrument(tracing::info_span!("process.exit", program, pid)),
                );
                Ok(Child { pid, exit })
            }
            Err(e) => {
                tracing::error!(error = %e, "spawn failed");
                Err(e)
            }
        }
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        let span = tracing::info_span!("process.terminate", pid);
        let _guard = span.enter();

        let result = self.inner.terminate(pid);
        match &result {
            Ok(()) => tracing::info!("terminated"),
            Err(e) => tracing::warn!(error = %e, "terminate failed"),
        }
        result
    }
}

/// Wrapper that adds tracing to any LockAdapter
#[derive(Clone)]
pub struct TracedLockAdapter<L> {
    inner: L,
}

impl<L> TracedLockAdapter<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: LockAdapter> LockAdapter for TracedLockAdapter<L> {
    fn acquire(&self, device: &str) -> Result<bool, LockError> {
        let span = tracing::info_span!("lock.acquire", device);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.acquire(device);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(true) => tracing::debug!(elapsed_ms, "locked"),
            Ok(false) => tracing::info!(elapsed_ms, "device busy"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "lock failed"),
        }
        result
    }

    fn release(&self, device: &str) -> Result<(), LockError> {
        let result = self.inner.release(device);
        match &result {
            Ok(()) => tracing::debug!(device, "unlocked"),
            Err(e) => tracing::warn!(device, error = %e, "unlock failed"),
        }
        result
    }

    fn is_free(&self, device: &str) -> Result<bool, LockError> {
        let result = self.inner.is_free(device);
        tracing::trace!(device, free = ?result.as_ref().ok(), "checked");
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
