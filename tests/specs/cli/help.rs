//! CLI help and error specs
//!
//! Verify faxctl argument handling without a running daemon.

use crate::prelude::*;

#[test]
fn faxctl_help_lists_commands() {
    let temp = Spool::empty();
    let run = temp.faxctl().args(&["--help"]).passes();
    for command in ["submit", "suspend", "remove", "kill", "alter", "config", "modem", "quit"] {
        assert!(run.stdout().contains(command), "help missing {command}");
    }
}

#[test]
fn faxctl_reports_stopped_scheduler() {
    let temp = Spool::empty();
    temp.faxctl()
        .args(&["submit", "1"])
        .fails()
        .stderr_has("Scheduler not running");
}

#[test]
fn faxctl_rejects_unknown_modem_state() {
    let temp = Spool::empty();
    temp.faxctl()
        .args(&["modem", "ttyS0", "asleep"])
        .fails()
        .stderr_has("unknown modem state");
}

#[test]
fn faxctl_requires_a_job_id() {
    let temp = Spool::empty();
    temp.faxctl().args(&["kill"]).fails().stderr_has("<ID>");
}
