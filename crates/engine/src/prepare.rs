// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job preparation: everything between modem assignment and the send
//!
//! Planning is synchronous and decides whether any slow work is needed.
//! The slow part (imaging documents, generating a continuation cover page)
//! runs as a supervised task whose result is folded back into the record by
//! the scheduler.

use crate::imager::{self, ImageRequest, ImageResult, PageParams};
use fq_adapters::{ProcessAdapter, ProcessSpec};
use fq_core::config::Commands;
use fq_core::{DocOp, FaxRequest, JobId, OpKind, PrepStatus};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PlannedImage {
    pub index: usize,
    /// Spool-relative names
    pub source: String,
    pub base: String,
    pub imaged: String,
    pub request: ImageRequest,
}

/// Work one job needs before it can be sent
#[derive(Debug, Clone)]
pub struct PrepPlan {
    pub job: JobId,
    pub images: Vec<PlannedImage>,
    pub cover: Option<ProcessSpec>,
    pub cover_item: String,
}

impl PrepPlan {
    pub fn needs_work(&self) -> bool {
        !self.images.is_empty() || self.cover.is_some()
    }
}

/// An imaged document produced (or reused) for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imaged {
    pub index: usize,
    pub source: String,
    pub base: String,
    pub item: String,
}

/// Result of a preparation task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub status: PrepStatus,
    pub imaged: Vec<Imaged>,
    /// Outputs of failed conversions, already removed from disk
    pub abandoned: Vec<Imaged>,
    pub ccover: Option<String>,
}

impl Prepared {
    pub fn done() -> Self {
        Self::with_status(PrepStatus::Done)
    }

    pub fn with_status(status: PrepStatus) -> Self {
        Self {
            status,
            imaged: Vec::new(),
            abandoned: Vec::new(),
            ccover: None,
        }
    }
}

fn inside_spool(item: &str) -> bool {
    let path = Path::new(item);
    !path.is_absolute() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Decide what preparation a job needs. Policy violations and missing
/// converters are reported immediately as the failing status.
pub fn plan(
    req: &FaxRequest,
    root: &Path,
    commands: &Commands,
    max_pages: u16,
    caps: &BTreeMap<String, String>,
) -> Result<PrepPlan, PrepStatus> {
    if req.items.is_empty() {
        return Err(PrepStatus::Rejected("Job has nothing to send".to_string()));
    }
    if let Some(doc) = req
        .items
        .iter()
        .filter(|d| d.op.doc_kind().is_some() || d.op == OpKind::Fax)
        .find(|d| !inside_spool(&d.item))
    {
        return Err(PrepStatus::Rejected(format!(
            "Document {} is outside the spool",
            doc.item
        )));
    }

    let resolution = caps
        .get("resolution")
        .and_then(|r| r.parse::<u16>().ok())
        .map_or(req.resolution, |remote| remote.min(req.resolution));
    let params = PageParams {
        resolution,
        width: req.pagewidth,
        length: req.pagelength,
        max_pages,
        format: req.desireddf,
    };

    let mut images = Vec::new();
    for (index, doc) in req.pending_images() {
        let Some(kind) = doc.op.doc_kind() else {
            continue;
        };
        let Some(converter) = commands.converters.get(kind) else {
            return Err(PrepStatus::NoFormatter(format!(
                "No converter configured for {} documents",
                kind.name()
            )));
        };
        let (base, imaged) = imager::imaged_item(&doc.item, &req.jobid, &params);
        images.push(PlannedImage {
            index,
            source: doc.item.clone(),
            base,
            imaged: imaged.clone(),
            request: ImageRequest {
                kind,
                converter: imager::resolve_command(root, converter),
                cwd: root.to_path_buf(),
                input: PathBuf::from(&doc.item),
                output: root.join(&imaged),
                params,
            },
        });
    }

    let cover_item = format!("docq/ccover.{}", req.jobid);
    let cover = match &commands.cover {
        Some(cmd) if req.useccover && req.npages > 0 => Some(
            ProcessSpec::new(imager::resolve_command(root, cmd), root)
                .arg("-o")
                .arg(cover_item.clone())
                .arg(format!("sendq/{}", req.jobid.qfile())),
        ),
        _ => None,
    };

    Ok(PrepPlan {
        job: req.jobid.clone(),
        images,
        cover,
        cover_item,
    })
}

/// Run the slow part of a plan
pub async fn run<P: ProcessAdapter>(procs: P, plan: PrepPlan, pid: Arc<AtomicU32>) -> Prepared {
    let mut prepared = Prepared::done();

    for image in &plan.images {
        let done = Imaged {
            index: image.index,
            source: image.source.clone(),
            base: image.base.clone(),
            item: image.imaged.clone(),
        };
        let status = match imager::image_document(&procs, &image.request, &pid).await {
            ImageResult::Converted | ImageResult::Reused => {
                prepared.imaged.push(done);
                continue;
            }
            ImageResult::NoConverter(msg) => PrepStatus::NoFormatter(msg),
            ImageResult::Failed(msg) => PrepStatus::FormatFailed(msg),
            ImageResult::Transient(msg) => PrepStatus::Retry(msg),
        };
        tracing::warn!(job_id = %plan.job, document = %image.source, status = status.message(), "imaging failed");
        prepared.abandoned.push(done);
        prepared.status = status;
        return prepared;
    }

    if let Some(spec) = &plan.cover {
        match procs.spawn(spec) {
            Ok(child) => {
                let output = child.exit.await;
                if output.success() {
                    prepared.ccover = Some(plan.cover_item.clone());
                } else {
                    tracing::warn!(job_id = %plan.job, code = ?output.code, "continuation cover failed");
                }
            }
            Err(e) => tracing::warn!(job_id = %plan.job, error = %e, "cannot run cover page command"),
        }
    }
    prepared
}

/// Fold a successful preparation into the record: mark imaged sources as
/// saved, add the imaged fax documents after them, and recompute page
/// handling.
pub fn apply(req: &mut FaxRequest, prepared: &Prepared) {
    let mut imaged = prepared.imaged.clone();
    imaged.sort_by(|a, b| b.index.cmp(&a.index));
    for im in imaged {
        let Some(source) = req.items.get_mut(im.index) else {
            continue;
        };
        if source.item != im.source || !source.op.needs_imaging() {
            continue;
        }
        source.op = source.op.saved();
        let fax = DocOp {
            op: OpKind::Fax,
            dirnum: source.dirnum,
            addr: source.addr.clone(),
            item: im.item,
        };
        req.items.insert(im.index + 1, fax);
    }
    if let Some(cover) = &prepared.ccover {
        req.ccover = cover.clone();
    }
    req.pagehandling = page_handling(req);
}

/// Undo imaging so the next attempt re-images every document
pub fn unsave(req: &mut FaxRequest) {
    req.items.retain(|d| !(d.op == OpKind::Fax && d.item.contains(';')));
    for doc in &mut req.items {
        doc.op = doc.op.unsaved();
    }
    req.pagehandling.clear();
}

fn imaged_params(item: &str) -> Option<(u16, u16, u16)> {
    let (_, suffix) = item.rsplit_once(";r")?;
    let (res, rest) = suffix.split_once('w')?;
    let (width, length) = rest.split_once('l')?;
    Some((res.parse().ok()?, width.parse().ok()?, length.parse().ok()?))
}

/// Session handling per fax document: `P` negotiates new page parameters,
/// `S` keeps the previous document's, and `E` ends the session.
pub fn page_handling(req: &FaxRequest) -> String {
    let mut out = String::new();
    let mut previous = None;
    for doc in req.fax_documents() {
        let params = imaged_params(&doc.item).unwrap_or((req.resolution, req.pagewidth, req.pagelength));
        out.push(if previous == Some(params) { 'S' } else { 'P' });
        previous = Some(params);
    }
    if !out.is_empty() {
        out.push('E');
    }
    out
}

#[cfg(test)]
#[path = "prepare_tests.rs"]
mod tests;
