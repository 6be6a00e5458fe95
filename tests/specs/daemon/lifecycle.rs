//! Daemon lifecycle specs
//!
//! Verify faxqd start, singleton and stop behavior.

use crate::prelude::*;
use nix::sys::signal::Signal;

#[test]
fn daemon_creates_fifo_and_pid_file() {
    let temp = Spool::empty();
    let daemon = temp.start_daemon();

    let pid = temp.read("faxqd.pid").unwrap_or_default();
    assert_eq!(pid.trim(), daemon.pid().to_string());
    for dir in ["sendq", "doneq", "docq", "tmp"] {
        assert!(temp.path().join(dir).is_dir(), "missing {dir}/");
    }
}

#[test]
fn second_daemon_is_refused() {
    let temp = Spool::empty();
    let _daemon = temp.start_daemon();

    let status = std::process::Command::new(bin("faxqd"))
        .arg(temp.path())
        .output()
        .unwrap()
        .status;
    assert!(!status.success());
    // The first daemon keeps the spool
    assert!(temp.exists("FIFO"));
}

#[test]
fn quit_stops_the_daemon() {
    let temp = Spool::empty();
    let mut daemon = temp.start_daemon();

    temp.faxctl().args(&["--wait", "quit"]).passes().stdout_has("ok");

    assert!(daemon.exited(), "daemon still running after quit");
    assert!(!temp.exists("FIFO"));
    assert!(!temp.exists("faxqd.pid"));
}

#[test]
fn sigterm_stops_the_daemon() {
    let temp = Spool::empty();
    let mut daemon = temp.start_daemon();

    daemon.signal(Signal::SIGTERM);

    assert!(daemon.exited(), "daemon still running after SIGTERM");
    assert!(!temp.exists("faxqd.pid"));
}

#[test]
fn daemon_fails_on_missing_spool() {
    let temp = Spool::empty();
    let status = std::process::Command::new(bin("faxqd"))
        .arg(temp.path().join("absent"))
        .output()
        .unwrap()
        .status;
    assert!(!status.success());
}
