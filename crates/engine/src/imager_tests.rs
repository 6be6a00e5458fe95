// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fq_adapters::{FakeProcessAdapter, ProcessCall};
use fq_core::JobId;

fn params() -> PageParams {
    PageParams {
        resolution: 196,
        width: 209,
        length: 296,
        max_pages: 100,
        format: 0,
    }
}

#[test]
fn converter_argv() {
    let spec = converter_spec(
        Path::new("bin/ps2fax"),
        Path::new("/spool"),
        Path::new("docq/doc1.ps.7"),
        Path::new("docq/doc1.ps;r196w209l296"),
        &PageParams {
            format: 2,
            ..params()
        },
    );
    assert_eq!(
        spec.args,
        [
            "-o",
            "docq/doc1.ps;r196w209l296",
            "-r",
            "196",
            "-w",
            "209",
            "-l",
            "296",
            "-m",
            "100",
            "-U",
            "-2",
            "docq/doc1.ps.7"
        ]
    );
}

#[test]
fn imaged_item_strips_the_job_link() {
    let (base, imaged) = imaged_item("docq/doc1.ps.7", &JobId::new("7"), &params());
    assert_eq!(base, "docq/doc1.ps");
    assert_eq!(imaged, "docq/doc1.ps;r196w209l296");
}

#[tokio::test]
async fn owner_runs_the_converter() {
    let dir = tempfile::tempdir().unwrap();
    let procs = FakeProcessAdapter::new();
    procs.script("ps2fax", 0, "");
    let out = dir.path().join("doc1.ps;r196w209l296");
    let pid = Arc::new(AtomicU32::new(0));

    let result = image_document(
        &procs,
        &ImageRequest {
            kind: DocKind::PostScript,
            converter: Path::new("bin/ps2fax").to_path_buf(),
            cwd: dir.path().to_path_buf(),
            input: Path::new("doc1.ps.7").to_path_buf(),
            output: out.clone(),
            params: params(),
        },
        &pid,
    )
    .await;

    assert_eq!(result, ImageResult::Converted);
    assert!(out.exists());
    assert_eq!(procs.spawned().len(), 1);
    assert_eq!(pid.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn finished_image_is_reused_without_converting() {
    let dir = tempfile::tempdir().unwrap();
    let procs = FakeProcessAdapter::new();
    let out = dir.path().join("doc1.ps;r196w209l296");
    std::fs::write(&out, b"II*\0").unwrap();

    let result = image_document(
        &procs,
        &ImageRequest {
            kind: DocKind::PostScript,
            converter: Path::new("bin/ps2fax").to_path_buf(),
            cwd: dir.path().to_path_buf(),
            input: Path::new("doc1.ps.8").to_path_buf(),
            output: out.clone(),
            params: params(),
        },
        &Arc::new(AtomicU32::new(0)),
    )
    .await;

    assert_eq!(result, ImageResult::Reused);
    assert!(procs.calls().is_empty());
}

#[tokio::test]
async fn empty_leftover_is_reconverted() {
    let dir = tempfile::tempdir().unwrap();
    let procs = FakeProcessAdapter::new();
    procs.script("ps2fax", 0, "");
    let out = dir.path().join("doc1.ps;r196w209l296");
    std::fs::write(&out, b"").unwrap();

    let result = image_document(
        &procs,
        &ImageRequest {
            kind: DocKind::PostScript,
            converter: Path::new("bin/ps2fax").to_path_buf(),
            cwd: dir.path().to_path_buf(),
            input: Path::new("doc1.ps.8").to_path_buf(),
            output: out.clone(),
            params: params(),
        },
        &Arc::new(AtomicU32::new(0)),
    )
    .await;

    assert_eq!(result, ImageResult::Converted);
    assert!(matches!(procs.calls()[0], ProcessCall::Spawn { .. }));
}

#[tokio::test]
async fn failed_conversion_removes_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let procs = FakeProcessAdapter::new();
    procs.script("pdf2fax", 1, "Unsupported PDF version\n");
    let out = dir.path().join("doc2.pdf;r98w209l296");

    let result = image_document(
        &procs,
        &ImageRequest {
            kind: DocKind::Pdf,
            converter: Path::new("bin/pdf2fax").to_path_buf(),
            cwd: dir.path().to_path_buf(),
            input: Path::new("doc2.pdf.9").to_path_buf(),
            output: out.clone(),
            params: params(),
        },
        &Arc::new(AtomicU32::new(0)),
    )
    .await;

    assert_eq!(result, ImageResult::Failed("Unsupported PDF version".to_string()));
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_converter_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let procs = FakeProcessAdapter::new();
    procs.fail_spawn("pcl2fax");
    let out = dir.path().join("doc3.pcl;r98w209l296");

    let result = image_document(
        &procs,
        &ImageRequest {
            kind: DocKind::Pcl,
            converter: Path::new("bin/pcl2fax").to_path_buf(),
            cwd: dir.path().to_path_buf(),
            input: Path::new("doc3.pcl.9").to_path_buf(),
            output: out.clone(),
            params: params(),
        },
        &Arc::new(AtomicU32::new(0)),
    )
    .await;

    assert!(matches!(result, ImageResult::NoConverter(_)));
    assert!(!out.exists());
}
