// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document imaging cache
//!
//! A submitted document lives in the doc queue under a base name. Each job
//! that references it holds its own hard link `<base>.<jobid>`, so the base
//! file's link count tracks how many jobs still need it. Imaged variants are
//! named `<base>;r<res>w<width>l<length>` and are shared between jobs with
//! the same page parameters.
//!
//! Conversion into an imaged file is guarded by create-exclusive plus an
//! advisory lock: the creator holds an exclusive lock while the converter
//! runs and everyone else waits on a shared lock to reuse the result.

use crate::StorageError;
use fs2::FileExt;
use fq_core::JobId;
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the imaged variant of `base` for the given page parameters
pub fn imaged_name(base: &str, resolution: u16, width: u16, length: u16) -> String {
    format!("{base};r{resolution}w{width}l{length}")
}

/// Strip a job's `.<jobid>` link suffix, yielding the shared base name
pub fn base_name<'a>(item: &'a str, job: &JobId) -> &'a str {
    item.strip_suffix(job.as_str())
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(item)
}

/// Private name a claimant prepares its file under
fn staging_name(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".claim.{}.{n}", std::process::id()));
    PathBuf::from(name)
}

/// Outcome of claiming an imaged file
#[derive(Debug)]
pub enum Conversion {
    /// We created the file and hold its exclusive lock; run the converter
    /// into it, then drop the handle (or call [`DocCache::abandon`] on
    /// failure).
    Owner(File),
    /// Another job created it; wait for a shared lock before reading.
    Existing(File),
}

impl Conversion {
    /// Claim `path` for conversion. A file that vanishes between the failed
    /// create and the open was evicted concurrently; the claim is retried.
    ///
    /// The owner's file is locked under a private name and then linked into
    /// place, so `path` never exists without its exclusive lock.
    pub fn claim(path: &Path) -> Result<Self, StorageError> {
        loop {
            let staged = staging_name(path);
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&staged)
                .map_err(|e| StorageError::io(&staged, e))?;
            let linked = file
                .lock_exclusive()
                .and_then(|()| std::fs::hard_link(&staged, path));
            let _ = std::fs::remove_file(&staged);
            match linked {
                Ok(()) => return Ok(Conversion::Owner(file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => drop(file),
                Err(e) => return Err(StorageError::io(path, e)),
            }
            match File::open(path) {
                Ok(file) => return Ok(Conversion::Existing(file)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(path, e)),
            }
        }
    }

    /// Block until the converter holding the exclusive lock is finished.
    /// Returns false when the finished file is empty (the conversion failed).
    pub fn wait_ready(file: &File, path: &Path) -> Result<bool, StorageError> {
        file.lock_shared().map_err(|e| StorageError::io(path, e))?;
        let len = file.metadata().map_err(|e| StorageError::io(path, e))?.len();
        // Lock is released on close; unlock early so writers are not held up
        let _ = FileExt::unlock(file);
        Ok(len > 0)
    }
}

/// What a document release did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    /// The job's link became the base name because the base was gone
    pub renamed: bool,
    /// Imaged variants removed because no job references the base any more
    pub removed: Vec<PathBuf>,
}

/// Imaged variants waiting for their base document's last reference to go
#[derive(Debug, Default)]
pub struct DocCache {
    pending: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DocCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an imaged variant of `base`
    pub fn register(&mut self, base: &Path, imaged: &Path) {
        self.pending
            .entry(base.to_path_buf())
            .or_default()
            .insert(imaged.to_path_buf());
    }

    /// Imaged variants known for `base`
    pub fn variants(&self, base: &Path) -> impl Iterator<Item = &Path> {
        self.pending
            .get(base)
            .into_iter()
            .flat_map(|set| set.iter().map(PathBuf::as_path))
    }

    /// Remove a failed conversion's output so the next claim starts over
    pub fn abandon(&mut self, base: &Path, imaged: &Path) {
        if let Some(set) = self.pending.get_mut(base) {
            set.remove(imaged);
        }
        match std::fs::remove_file(imaged) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %imaged.display(), error = %e, "cannot remove failed image"),
        }
    }

    /// Drop a job's reference to a document.
    ///
    /// The job's link is unlinked, or renamed to the base name when the base
    /// no longer exists. When the base is then the only remaining link, every
    /// imaged variant of it is unlinked; the base document itself stays.
    pub fn release(&mut self, link: &Path, base: &Path) -> Result<Release, StorageError> {
        let mut outcome = Release::default();

        if link != base {
            if base.exists() {
                match std::fs::remove_file(link) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StorageError::io(link, e)),
                }
            } else {
                match std::fs::rename(link, base) {
                    Ok(()) => outcome.renamed = true,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StorageError::io(link, e)),
                }
            }
        }

        let nlink = match std::fs::metadata(base) {
            Ok(meta) => meta.nlink(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(StorageError::io(base, e)),
        };
        if nlink > 1 {
            return Ok(outcome);
        }

        let mut variants = self.pending.remove(base).unwrap_or_default();
        variants.extend(on_disk_variants(base));
        for imaged in variants {
            match std::fs::remove_file(&imaged) {
                Ok(()) => outcome.removed.push(imaged),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io(&imaged, e)),
            }
        }
        if !outcome.removed.is_empty() {
            tracing::debug!(base = %base.display(), removed = outcome.removed.len(), "imaged documents released");
        }
        Ok(outcome)
    }
}

/// Imaged siblings of `base` left by an earlier run
fn on_disk_variants(base: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(name)) = (base.parent(), base.file_name().and_then(|n| n.to_str())) else {
        return Vec::new();
    };
    let prefix = format!("{name};");
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with(&prefix)))
        .map(|e| e.path())
        .collect()
}

#[cfg(test)]
#[path = "docs_tests.rs"]
mod tests;
