//! Daemon log specs
//!
//! Verify what faxqd writes to log/faxqd.log.

use crate::prelude::*;

#[test]
fn log_starts_with_marker() {
    let temp = Spool::empty();
    let daemon = temp.start_daemon();

    let marker = format!("--- faxqd: starting (pid: {}) ---", daemon.pid());
    assert!(temp.log().contains(&marker), "log:\n{}", temp.log());
}

#[test]
fn log_reports_ready() {
    let temp = Spool::empty();
    let _daemon = temp.start_daemon();

    let ready = wait_for(SPEC_WAIT_MAX_MS, || temp.log().contains("Daemon ready"));
    assert!(ready, "log:\n{}", temp.log());
}

#[test]
fn config_log_filter_enables_debug_output() {
    let temp = Spool::empty();
    let config = temp.read("etc/config.toml").unwrap_or_default();
    temp.file("etc/config.toml", &format!("{config}log_filter = \"debug\"\n"));
    let _daemon = temp.start_daemon();

    temp.faxctl().args(&["--wait", "config", "max_dials", "4"]).passes();

    let logged = wait_for(SPEC_WAIT_MAX_MS, || temp.log().contains("Received command"));
    assert!(logged, "log:\n{}", temp.log());
}
