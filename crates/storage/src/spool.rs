// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spool directory layout

use crate::StorageError;
use fq_core::JobId;
use std::path::{Path, PathBuf};

/// Paths inside a spool directory
#[derive(Debug, Clone)]
pub struct Spool {
    root: PathBuf,
}

impl Spool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records of queued jobs
    pub fn sendq(&self) -> PathBuf {
        self.root.join("sendq")
    }

    /// Records of finished jobs
    pub fn doneq(&self) -> PathBuf {
        self.root.join("doneq")
    }

    /// Submitted documents and their imaged variants
    pub fn docq(&self) -> PathBuf {
        self.root.join("docq")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn etc(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn config_path(&self) -> PathBuf {
        self.etc().join("config.toml")
    }

    /// The scheduler's command FIFO
    pub fn fifo(&self) -> PathBuf {
        self.root.join("FIFO")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("faxqd.pid")
    }

    /// Record file of a queued job
    pub fn qfile(&self, id: &JobId) -> PathBuf {
        self.sendq().join(id.qfile())
    }

    /// Record file of a finished job
    pub fn done_qfile(&self, id: &JobId) -> PathBuf {
        self.doneq().join(id.qfile())
    }

    /// Spool-relative name as it appears in records and on command lines
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Resolve a spool-relative name from a record
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Create any missing spool directories
    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [
            self.sendq(),
            self.doneq(),
            self.docq(),
            self.tmp(),
            self.log_dir(),
            self.etc(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Ids of every record in the send queue, sorted
    pub fn queued_jobs(&self) -> Result<Vec<JobId>, StorageError> {
        let dir = self.sendq();
        let entries = std::fs::read_dir(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let mut ids: Vec<JobId> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name();
                let id = name.to_str()?.strip_prefix('q')?;
                (!id.is_empty()).then(|| JobId::new(id))
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
