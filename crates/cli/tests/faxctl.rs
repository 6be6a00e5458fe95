// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for faxctl
//!
//! A thread holding the spool FIFO open stands in for faxqd, reading the
//! command line and answering on the reply FIFO when one is named.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

use assert_cmd::Command;
use nix::sys::stat::Mode;
use predicates::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::thread::JoinHandle;
use tempfile::TempDir;

fn spool_with_reader() -> (TempDir, File) {
    let temp = TempDir::new().unwrap();
    let fifo = temp.path().join("FIFO");
    nix::unistd::mkfifo(&fifo, Mode::from_bits_truncate(0o600)).unwrap();
    let reader = OpenOptions::new().read(true).write(true).open(&fifo).unwrap();
    (temp, reader)
}

/// Read one command line and answer it with `ack` if it carries a reply FIFO
fn fake_scheduler(reader: File, ack: &'static [u8]) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).unwrap();
        if let Some((envelope, _)) = line.split_once(':') {
            if let Some(reply) = envelope.get(1..).and_then(|e| e.strip_prefix('@')) {
                let mut out = OpenOptions::new().write(true).open(reply).unwrap();
                out.write_all(ack).unwrap();
            }
        }
        line
    })
}

fn faxctl(spool: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("faxctl").unwrap();
    cmd.arg("--spool").arg(spool.path());
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("faxctl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("modem"))
        .stdout(predicate::str::contains("quit"));
}

#[test]
fn submit_writes_the_command_line() {
    let (temp, reader) = spool_with_reader();
    let scheduler = fake_scheduler(reader, b"");

    faxctl(&temp).args(["submit", "42"]).assert().success();
    assert_eq!(scheduler.join().unwrap(), "S:42\n");
}

#[test]
fn config_and_modem_lines() {
    let (temp, reader) = spool_with_reader();
    let scheduler = fake_scheduler(reader, b"");
    faxctl(&temp)
        .args(["config", "max_concurrent_calls", "2"])
        .assert()
        .success();
    assert_eq!(scheduler.join().unwrap(), "C:max_concurrent_calls:2\n");

    let reader = OpenOptions::new()
        .read(true)
        .write(true)
        .open(temp.path().join("FIFO"))
        .unwrap();
    let scheduler = fake_scheduler(reader, b"");
    faxctl(&temp)
        .args(["modem", "ttyS1", "busy"])
        .assert()
        .success();
    assert_eq!(scheduler.join().unwrap(), "+:ttyS1:B\n");
}

#[test]
fn wait_reports_acceptance() {
    let (temp, reader) = spool_with_reader();
    let scheduler = fake_scheduler(reader, b"K*\0");

    faxctl(&temp)
        .args(["--wait", "kill", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
    assert!(scheduler.join().unwrap().starts_with("K@"));
}

#[test]
fn wait_reports_rejection() {
    let (temp, reader) = spool_with_reader();
    let scheduler = fake_scheduler(reader, b"R!\0");

    faxctl(&temp)
        .args(["remove", "9", "--wait"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("scheduler rejected R:9"));
    scheduler.join().unwrap();
}

#[test]
fn stopped_scheduler_is_reported() {
    let temp = TempDir::new().unwrap();
    faxctl(&temp)
        .arg("quit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scheduler not running"));
}

#[test]
fn unknown_modem_state_fails_before_sending() {
    let temp = TempDir::new().unwrap();
    faxctl(&temp)
        .args(["modem", "ttyS1", "sleepy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown modem state"));
}

#[test]
fn missing_spool_is_reported() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("faxctl")
        .unwrap()
        .arg("--spool")
        .arg(temp.path().join("absent"))
        .arg("quit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Spool not found"));
}
