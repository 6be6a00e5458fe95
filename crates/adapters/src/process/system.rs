// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process adapter backed by tokio::process

use super::{Child, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioProcessAdapter;

impl TokioProcessAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessAdapter for TokioProcessAdapter {
    fn spawn(&self, spec: &ProcessSpec) -> Result<Child, ProcessError> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        let pid = child.id().unwrap_or_default();
        let stdout = child.stdout.take();

        let exit = Box::pin(async move {
            let mut captured = Vec::new();
            if let Some(mut out) = stdout {
                use tokio::io::AsyncReadExt;
                if let Err(e) = out.read_to_end(&mut captured).await {
                    tracing::warn!(pid, error = %e, "reading child output failed");
                }
            }
            match child.wait().await {
                Ok(status) => ProcessOutput {
                    code: status.code(),
                    stdout: String::from_utf8_lossy(&captured).into_owned(),
                },
                Err(e) => {
                    tracing::error!(pid, error = %e, "waiting for child failed");
                    ProcessOutput::default()
                }
            }
        });
        Ok(Child { pid, exit })
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        let raw = i32::try_from(pid).map_err(|_| ProcessError::Signal {
            pid,
            reason: "pid out of range".to_string(),
        })?;
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            // Already gone; its exit will still be reported
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::Signal {
                pid,
                reason: e.to_string(),
            }),
        }
    }
}
