// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Child, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Recorded process operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCall {
    Spawn { pid: u32, spec: ProcessSpec },
    Terminate { pid: u32 },
}

#[derive(Default)]
struct FakeState {
    next_pid: u32,
    calls: Vec<ProcessCall>,
    running: HashMap<u32, oneshot::Sender<ProcessOutput>>,
    /// Program name -> output returned immediately on spawn
    scripted: HashMap<String, ProcessOutput>,
    failing: Vec<String>,
}

/// Fake process adapter.
///
/// Spawned children stay running until [`FakeProcessAdapter::finish`] or
/// [`ProcessAdapter::terminate`] is called for their pid, unless the program
/// was scripted to exit immediately.
#[derive(Clone, Default)]
pub struct FakeProcessAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every spawn of `program` (matched by file name) exit at once
    pub fn script(&self, program: &str, code: i32, stdout: &str) {
        self.state().scripted.insert(
            program.to_string(),
            ProcessOutput {
                code: Some(code),
                stdout: stdout.to_string(),
            },
        );
    }

    /// Make every spawn of `program` fail to start
    pub fn fail_spawn(&self, program: &str) {
        self.state().failing.push(program.to_string());
    }

    /// Complete a running child
    pub fn finish(&self, pid: u32, code: i32, stdout: &str) -> bool {
        let sender = self.state().running.remove(&pid);
        match sender {
            Some(tx) => tx
                .send(ProcessOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<ProcessCall> {
        self.state().calls.clone()
    }

    /// Specs of every spawned child, in order
    pub fn spawned(&self) -> Vec<(u32, ProcessSpec)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                ProcessCall::Spawn { pid, spec } => Some((*pid, spec.clone())),
                ProcessCall::Terminate { .. } => None,
            })
            .collect()
    }

    /// Pids of children still running, lowest first
    pub fn running(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.state().running.keys().copied().collect();
        pids.sort_unstable();
        pids
    }
}

impl ProcessAdapter for FakeProcessAdapter {
    fn spawn(&self, spec: &ProcessSpec) -> Result<Child, ProcessError> {
        let name = spec.name();
        let mut state = self.state();
        if state.failing.contains(&name) {
            return Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            });
        }
        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.calls.push(ProcessCall::Spawn {
            pid,
            spec: spec.clone(),
        });

        if let Some(output) = state.scripted.get(&name).cloned() {
            return Ok(Child {
                pid,
                exit: Box::pin(async move { output }),
            });
        }

        let (tx, rx) = oneshot::channel();
        state.running.insert(pid, tx);
        Ok(Child {
            pid,
            exit: Box::pin(async move { rx.await.unwrap_or_default() }),
        })
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        let mut state = self.state();
        state.calls.push(ProcessCall::Terminate { pid });
        if let Some(tx) = state.running.remove(&pid) {
            let _ = tx.send(ProcessOutput::default());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
