// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document imaging: running a converter into a shared imaged file

use fq_adapters::{ProcessAdapter, ProcessError, ProcessSpec};
use fq_core::DocKind;
use fq_storage::Conversion;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Page parameters an imaged file is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub resolution: u16,
    pub width: u16,
    pub length: u16,
    pub max_pages: u16,
    /// Desired data format code of the request
    pub format: u16,
}

impl PageParams {
    /// Compression flags: `-1` MH, `-2` MR, `-3` MMR; `-U` allows uncompressed
    fn format_args(&self) -> &'static [&'static str] {
        match self.format {
            0 => &["-1"],
            1 => &["-2"],
            2 => &["-U", "-2"],
            _ => &["-3"],
        }
    }
}

/// Converter command line for one document
pub fn converter_spec(
    converter: &Path,
    cwd: &Path,
    input: &Path,
    output: &Path,
    params: &PageParams,
) -> ProcessSpec {
    let mut spec = ProcessSpec::new(converter, cwd)
        .arg("-o")
        .arg(output.display().to_string())
        .arg("-r")
        .arg(params.resolution.to_string())
        .arg("-w")
        .arg(params.width.to_string())
        .arg("-l")
        .arg(params.length.to_string())
        .arg("-m")
        .arg(params.max_pages.to_string());
    spec = spec.args(params.format_args().iter().copied());
    spec.arg(input.display().to_string())
}

/// How an imaging attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResult {
    /// This call ran the converter and it succeeded
    Converted,
    /// Another job already produced (or was producing) the file
    Reused,
    /// Converter is missing
    NoConverter(String),
    /// Converter ran and rejected the document
    Failed(String),
    /// Local trouble; worth another try later
    Transient(String),
}

/// One document to image
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub kind: DocKind,
    pub converter: PathBuf,
    /// Converters run from the spool root
    pub cwd: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: PageParams,
}

/// Attempts at claiming an imaged file before giving up on a flapping peer
const CLAIM_ATTEMPTS: usize = 3;

/// Produce `req.output` from `req.input` unless another job already did.
///
/// `pid` holds the running converter's pid (0 when none) so the caller can
/// terminate it.
pub async fn image_document<P: ProcessAdapter>(
    procs: &P,
    req: &ImageRequest,
    pid: &Arc<AtomicU32>,
) -> ImageResult {
    let output = req.output.as_path();
    for _ in 0..CLAIM_ATTEMPTS {
        let claim = match Conversion::claim(output) {
            Ok(claim) => claim,
            Err(e) => return ImageResult::Transient(e.to_string()),
        };
        match claim {
            Conversion::Owner(lock) => {
                let result = run_converter(procs, req, pid).await;
                if !matches!(result, ImageResult::Converted) {
                    remove_partial(output);
                }
                // Releasing the lock lets waiting jobs read the result
                drop(lock);
                return result;
            }
            Conversion::Existing(file) => {
                let path = output.to_path_buf();
                let ready = tokio::task::spawn_blocking(move || Conversion::wait_ready(&file, &path)).await;
                match ready {
                    Ok(Ok(true)) => return ImageResult::Reused,
                    // Left empty by a converter that failed or died; start over
                    Ok(Ok(false)) => remove_partial(output),
                    Ok(Err(e)) => return ImageResult::Transient(e.to_string()),
                    Err(e) => return ImageResult::Transient(e.to_string()),
                }
            }
        }
    }
    ImageResult::Failed(format!("conversion of {} keeps failing", req.input.display()))
}

async fn run_converter<P: ProcessAdapter>(
    procs: &P,
    req: &ImageRequest,
    pid: &Arc<AtomicU32>,
) -> ImageResult {
    let kind = req.kind.name();
    let spec = converter_spec(&req.converter, &req.cwd, &req.input, &req.output, &req.params);
    let child = match procs.spawn(&spec) {
        Ok(child) => child,
        Err(ProcessError::Spawn { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            return ImageResult::NoConverter(format!(
                "No {kind} converter installed ({})",
                req.converter.display()
            ))
        }
        Err(e) => return ImageResult::Transient(e.to_string()),
    };
    pid.store(child.pid, Ordering::SeqCst);
    let output = child.exit.await;
    pid.store(0, Ordering::SeqCst);

    match output.code {
        Some(0) => ImageResult::Converted,
        Some(code) => {
            let detail = output.stdout.trim();
            if detail.is_empty() {
                ImageResult::Failed(format!("Error converting {kind} document (exit {code})"))
            } else {
                ImageResult::Failed(detail.to_string())
            }
        }
        None => ImageResult::Transient(format!("{kind} converter was terminated")),
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove failed image"),
    }
}

/// Spool-relative docq name of an imaged variant
pub fn imaged_item(source_item: &str, job: &fq_core::JobId, params: &PageParams) -> (String, String) {
    let base = fq_storage::base_name(source_item, job).to_string();
    let imaged = fq_storage::imaged_name(&base, params.resolution, params.width, params.length);
    (base, imaged)
}

/// Resolve a converter path against the spool root
pub fn resolve_command(root: &Path, cmd: &Path) -> PathBuf {
    if cmd.is_absolute() {
        cmd.to_path_buf()
    } else {
        root.join(cmd)
    }
}

#[cfg(test)]
#[path = "imager_tests.rs"]
mod tests;
