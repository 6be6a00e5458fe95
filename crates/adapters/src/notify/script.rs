// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification through an external hook program

use super::{Notice, NotifyAdapter, NotifyError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the hook from the spool directory and reaps it in the background
#[derive(Clone, Debug)]
pub struct ScriptNotifyAdapter {
    cwd: PathBuf,
}

impl ScriptNotifyAdapter {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl NotifyAdapter for ScriptNotifyAdapter {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let mut child = Command::new(&notice.hook)
            .args(notice.args())
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                hook: notice.hook.clone(),
                source,
            })?;

        let qfile = notice.qfile.clone();
        let reason = notice.reason;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => tracing::warn!(qfile, %reason, ?status, "notification hook failed"),
                Err(e) => tracing::warn!(qfile, %reason, error = %e, "notification hook lost"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyReason;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    #[tokio::test]
    async fn hook_receives_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let hook = dir.path().join("notify");
        std::fs::write(&hook, "#!/bin/sh\necho \"$@\" > notified\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let adapter = ScriptNotifyAdapter::new(dir.path());
        adapter
            .notify(&Notice {
                hook: hook.clone(),
                qfile: "sendq/q3".to_string(),
                reason: NotifyReason::Done,
                duration: Some(Duration::from_secs(5)),
                next_tts: None,
            })
            .await
            .unwrap();

        let out = dir.path().join("notified");
        for _ in 0..100 {
            if std::fs::read_to_string(&out).is_ok_and(|s| s.ends_with('\n')) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "sendq/q3 done 5\n");
    }

    #[tokio::test]
    async fn missing_hook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = ScriptNotifyAdapter::new(dir.path());
        let err = adapter
            .notify(&Notice {
                hook: dir.path().join("nope"),
                qfile: "sendq/q3".to_string(),
                reason: NotifyReason::Failed,
                duration: None,
                next_tts: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Spawn { .. }));
    }
}
