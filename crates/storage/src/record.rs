// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locked access to request record files
//!
//! A record is only ever read or rewritten while holding an exclusive lock on
//! its file. The lock is released when the [`RecordFile`] is dropped, so the
//! handle should be kept only for the duration of one read-modify-write.

use crate::{Spool, StorageError};
use fq_core::{DoneOp, FaxRequest};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct RecordFile {
    file: File,
    path: PathBuf,
}

impl RecordFile {
    /// Open an existing record and take its exclusive lock
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        file.lock_exclusive().map_err(|e| StorageError::io(&path, e))?;
        Ok(Self { file, path })
    }

    /// Create a new record; fails if one already exists
    pub fn create(path: impl Into<PathBuf>, req: &FaxRequest) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        file.lock_exclusive().map_err(|e| StorageError::io(&path, e))?;
        let mut record = Self { file, path };
        record.write(req)?;
        Ok(record)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self) -> Result<FaxRequest, StorageError> {
        let mut text = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut text))
            .map_err(|e| StorageError::io(&self.path, e))?;
        FaxRequest::parse(&text).map_err(|source| StorageError::Record {
            path: self.path.clone(),
            source,
        })
    }

    /// Rewrite in place: seek to start, write, truncate
    pub fn write(&mut self, req: &FaxRequest) -> Result<(), StorageError> {
        let text = req.to_text();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(text.as_bytes()))
            .and_then(|_| self.file.set_len(text.len() as u64))
            .and_then(|_| self.file.sync_data())
            .map_err(|e| StorageError::io(&self.path, e))
    }
}

/// Read a record under its lock
pub fn read(path: &Path) -> Result<FaxRequest, StorageError> {
    RecordFile::open(path)?.read()
}

/// Rewrite a record under its lock
pub fn write(path: &Path, req: &FaxRequest) -> Result<(), StorageError> {
    RecordFile::open(path)?.write(req)
}

/// Move a finished job's record out of the send queue according to its
/// `doneop`: into the done queue, or deleted outright.
pub fn archive(spool: &Spool, req: &FaxRequest) -> Result<(), StorageError> {
    let from = spool.qfile(&req.jobid);
    let result = match req.doneop {
        DoneOp::Archive => {
            let to = spool.done_qfile(&req.jobid);
            std::fs::rename(&from, &to)
        }
        DoneOp::Remove => std::fs::remove_file(&from),
    };
    match result {
        Ok(()) => {
            tracing::debug!(job_id = %req.jobid, doneop = req.doneop.name(), "record archived");
            Ok(())
        }
        Err(e) => Err(StorageError::io(from, e)),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
