// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UUCP-style lock files: `<dir>/LCK..<device>` holding the owner's pid

use super::{LockAdapter, LockError};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct UucpLockAdapter {
    dir: PathBuf,
    pid: u32,
}

impl UucpLockAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pid: std::process::id(),
        }
    }

    /// Lock file for a device name (`/dev/ttyS0` and `ttyS0` share one)
    pub fn lock_path(&self, device: &str) -> PathBuf {
        let base = Path::new(device)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| device.to_string());
        self.dir.join(format!("LCK..{base}"))
    }

    fn io(path: &Path, source: std::io::Error) -> LockError {
        LockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Pid recorded in an existing lock, or `None` when unreadable
    fn owner(path: &Path) -> Result<Option<u32>, LockError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(text.trim().parse().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io(path, e)),
        }
    }

    /// Whether a lock file exists and names a live process
    fn held(&self, path: &Path) -> Result<bool, LockError> {
        if !path.exists() {
            return Ok(false);
        }
        match Self::owner(path)? {
            Some(pid) if pid == self.pid => Ok(true),
            Some(pid) => Ok(alive(pid)),
            None => Ok(false),
        }
    }
}

fn alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // EPERM: exists but belongs to someone else
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

impl LockAdapter for UucpLockAdapter {
    fn acquire(&self, device: &str) -> Result<bool, LockError> {
        let path = self.lock_path(device);
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(format!("{:>10}\n", self.pid).as_bytes())
                        .map_err(|e| Self::io(&path, e))?;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::owner(&path)? == Some(self.pid) {
                        return Ok(true);
                    }
                    if self.held(&path)? {
                        return Ok(false);
                    }
                    tracing::info!(path = %path.display(), "removing stale lock");
                    match std::fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(Self::io(&path, e)),
                    }
                }
                Err(e) => return Err(Self::io(&path, e)),
            }
        }
        Ok(false)
    }

    fn release(&self, device: &str) -> Result<(), LockError> {
        let path = self.lock_path(device);
        if Self::owner(&path)? != Some(self.pid) {
            return Ok(());
        }
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io(&path, e)),
        }
    }

    fn is_free(&self, device: &str) -> Result<bool, LockError> {
        let path = self.lock_path(device);
        Ok(!self.held(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreign_lock(adapter: &UucpLockAdapter, device: &str, pid: u32) {
        std::fs::write(adapter.lock_path(device), format!("{pid:>10}\n")).unwrap();
    }

    #[test]
    fn acquire_writes_our_pid() {
        let dir = tempfile::tempdir().unwrap();
        let locks = UucpLockAdapter::new(dir.path());
        assert!(locks.acquire("/dev/ttyS0").unwrap());

        let text = std::fs::read_to_string(dir.path().join("LCK..ttyS0")).unwrap();
        assert_eq!(text.trim(), std::process::id().to_string());
        // Re-acquiring our own lock succeeds
        assert!(locks.acquire("ttyS0").unwrap());
    }

    #[test]
    fn live_foreign_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let locks = UucpLockAdapter::new(dir.path());
        // pid 1 always exists
        foreign_lock(&locks, "ttyS1", 1);
        assert!(!locks.acquire("ttyS1").unwrap());
        assert!(!locks.is_free("ttyS1").unwrap());
        // Not ours to remove
        locks.release("ttyS1").unwrap();
        assert!(locks.lock_path("ttyS1").exists());
    }

    #[test]
    fn stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let locks = UucpLockAdapter::new(dir.path());
        foreign_lock(&locks, "ttyS2", i32::MAX as u32);
        assert!(locks.is_free("ttyS2").unwrap());
        assert!(locks.acquire("ttyS2").unwrap());
    }

    #[test]
    fn garbage_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let locks = UucpLockAdapter::new(dir.path());
        std::fs::write(locks.lock_path("ttyS3"), "not a pid").unwrap();
        assert!(locks.acquire("ttyS3").unwrap());
    }

    #[test]
    fn release_removes_our_lock() {
        let dir = tempfile::tempdir().unwrap();
        let locks = UucpLockAdapter::new(dir.path());
        assert!(locks.acquire("ttyS4").unwrap());
        locks.release("ttyS4").unwrap();
        assert!(!locks.lock_path("ttyS4").exists());
        assert!(locks.is_free("ttyS4").unwrap());
    }
}
