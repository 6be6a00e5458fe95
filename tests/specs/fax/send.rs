//! Fax transmission specs
//!
//! Verify jobs flow from sendq/ through a sender to doneq/.

use crate::prelude::*;

fn archived(temp: &Spool, id: &str) -> String {
    let path = format!("doneq/q{id}");
    let done = wait_for(SPEC_WAIT_MAX_MS, || temp.exists(&path));
    assert!(done, "q{id} never reached doneq/; log:\n{}", temp.log());
    temp.read(&path).unwrap_or_default()
}

#[test]
fn queued_job_is_recovered_and_sent() {
    let temp = Spool::empty();
    temp.script("bin/faxsend", SENDER_OK);
    temp.queue_job("1", "5550100");

    let _daemon = temp.start_daemon();

    let record = archived(&temp, "1");
    assert!(record.contains("state:7\n"), "record:\n{record}");
    assert!(!temp.exists("sendq/q1"));
    let sent = temp.read("sent.log").unwrap_or_default();
    assert!(sent.contains("-m ttyS0 sendq/q1"), "sender args: {sent}");
}

#[test]
fn submitted_job_is_sent() {
    let temp = Spool::empty();
    temp.script("bin/faxsend", SENDER_OK);
    let _daemon = temp.start_daemon();

    temp.queue_job("2", "5550100");
    temp.faxctl().args(&["--wait", "submit", "2"]).passes().stdout_has("ok");

    let record = archived(&temp, "2");
    assert!(record.contains("state:7\n"), "record:\n{record}");
}

#[test]
fn rejected_document_fails_the_job() {
    let temp = Spool::empty();
    temp.script("bin/faxsend", SENDER_REJECTED);
    temp.queue_job("3", "5550100");

    let _daemon = temp.start_daemon();

    let record = archived(&temp, "3");
    assert!(record.contains("state:8\n"), "record:\n{record}");
    assert!(record.contains("Remote rejected document"), "record:\n{record}");
}

#[test]
fn killed_job_is_archived_without_sending() {
    let temp = Spool::empty();
    temp.script("bin/faxsend", SENDER_OK);
    // Far in the future, so the job is still sleeping when killed
    temp.queue_record("4", "jobid:4\nnumber:5550100\ntts:4102444800\nfax:0::docq/fax4.tif\n");
    let _daemon = temp.start_daemon();

    temp.faxctl().args(&["--wait", "kill", "4"]).passes();

    let record = archived(&temp, "4");
    assert!(record.contains("state:8\n"), "record:\n{record}");
    assert!(!temp.exists("sent.log"));
}

#[test]
fn unknown_job_is_rejected() {
    let temp = Spool::empty();
    let _daemon = temp.start_daemon();

    temp.faxctl()
        .args(&["--wait", "remove", "99"])
        .fails()
        .stderr_has("scheduler rejected R:99");
}
