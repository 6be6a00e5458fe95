// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::batch::SingleJobPolicy;
use crate::job::Slot;
use fq_adapters::{FakeFifoAdapter, FakeLockAdapter, FakeNotifyAdapter, FakeProcessAdapter};
use fq_core::event::decode_event;
use fq_core::{Config, DocOp, FakeClock, JobState, OpKind};
use fq_storage::read_record;
use std::path::PathBuf;
use tempfile::TempDir;

type TestQueue = QueueManager<FakeProcessAdapter, FakeLockAdapter, FakeNotifyAdapter, FakeFifoAdapter, FakeClock>;

struct Harness {
    _dir: TempDir,
    spool: Spool,
    clock: FakeClock,
    procs: FakeProcessAdapter,
    locks: FakeLockAdapter,
    notify: FakeNotifyAdapter,
    fifo: FakeFifoAdapter,
    qm: TestQueue,
}

fn config() -> Config {
    let mut config = Config {
        modems: vec!["ttyS0".to_string()],
        ..Config::default()
    };
    config.commands.notify = Some(PathBuf::from("bin/notify"));
    config
}

fn harness(config: Config) -> Harness {
    harness_with(config, crate::batch::DefaultBatchPolicy)
}

fn harness_with(config: Config, policy: impl BatchPolicy + 'static) -> Harness {
    let dir = TempDir::new().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_dirs().unwrap();
    let clock = FakeClock::new();
    let procs = FakeProcessAdapter::new();
    let locks = FakeLockAdapter::new();
    let notify = FakeNotifyAdapter::new();
    let fifo = FakeFifoAdapter::new();
    let deps = QueueDeps {
        procs: procs.clone(),
        locks: locks.clone(),
        notify: notify.clone(),
        fifo: fifo.clone(),
    };
    let qm = QueueManager::new(spool.clone(), ConfigSource::in_memory(config), deps, clock.clone()).with_policy(policy);
    Harness {
        _dir: dir,
        spool,
        clock,
        procs,
        locks,
        notify,
        fifo,
        qm,
    }
}

impl Harness {
    /// Write a ready-to-send record for `id`
    fn write_job(&self, id: &str, edit: impl FnOnce(&mut FaxRequest)) -> JobId {
        let id = JobId::new(id);
        let mut req = FaxRequest::new(id.clone(), "5550100");
        req.items.push(DocOp::new(OpKind::Fax, format!("docq/fax{id}.tif")));
        edit(&mut req);
        std::fs::write(self.spool.qfile(&id), req.to_text()).unwrap();
        id
    }

    async fn submit(&mut self, id: &JobId) -> Ack {
        self.qm.handle_command(Command::Submit(id.clone()), None).await
    }

    fn record(&self, id: &JobId) -> FaxRequest {
        read_record(&self.spool.qfile(id)).unwrap()
    }

    fn done_record(&self, id: &JobId) -> FaxRequest {
        read_record(&self.spool.done_qfile(id)).unwrap()
    }

    fn slot(&self, id: &JobId) -> Option<Slot> {
        self.qm.job(id).map(|j| j.slot)
    }

    /// Pids of every spawn of `program` once there are at least `n`
    async fn spawned(&self, program: &str, n: usize) -> Vec<u32> {
        for _ in 0..500 {
            let pids: Vec<u32> = self
                .procs
                .spawned()
                .into_iter()
                .filter(|(_, spec)| spec.name() == program)
                .map(|(pid, _)| pid)
                .collect();
            if pids.len() >= n {
                return pids;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("{program} was not started {n} times");
    }

    async fn complete_next(&mut self) {
        let completion = tokio::time::timeout(Duration::from_secs(5), self.qm.next_completion())
            .await
            .unwrap()
            .unwrap();
        self.qm.handle_completion(completion).await;
    }

    /// Finish a running send and handle its result
    async fn finish_send(&mut self, pid: u32, code: i32) {
        assert!(self.procs.finish(pid, code, ""));
        self.complete_next().await;
    }
}

#[tokio::test]
async fn expired_submission_times_out_without_queueing() {
    let mut h = harness(config());
    let past = (h.clock.now() - chrono::TimeDelta::seconds(10)).timestamp();
    let id = h.write_job("1", |req| req.killtime = past);

    assert_eq!(h.submit(&id).await, Ack::Ok('S'));

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Kill time expired");
    assert!(!h.spool.qfile(&id).exists());
    assert_eq!(h.slot(&id), Some(Slot::Dead));
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::TimedOut]);

    h.qm.run_scheduler();
    assert!(h.qm.job(&id).is_none());
    assert!(h.procs.spawned().is_empty());
}

#[tokio::test]
async fn future_send_time_sleeps_until_due() {
    let mut h = harness(config());
    let later = (h.clock.now() + chrono::TimeDelta::seconds(600)).timestamp();
    let id = h.write_job("1", |req| req.tts = later);

    h.submit(&id).await;
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
    assert_eq!(h.record(&id).state, JobState::Pending);
    assert_eq!(h.qm.next_wakeup().map(|t| t.timestamp()), Some(later));

    h.clock.advance(Duration::from_secs(601));
    h.qm.tick().await;
    assert_eq!(h.record(&id).state, JobState::Active);
    assert_eq!(h.spawned("faxsend", 1).await.len(), 1);
}

#[tokio::test]
async fn successful_send_archives_the_job() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();

    let pid = h.spawned("faxsend", 1).await[0];
    let (_, spec) = h.procs.spawned().into_iter().find(|(p, _)| *p == pid).unwrap();
    assert_eq!(spec.args, ["-m", "ttyS0", "sendq/q1"]);
    assert_eq!(h.locks.held(), vec!["ttyS0".to_string()]);

    h.finish_send(pid, 0).await;
    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Done);
    assert_eq!(req.ntries, 1);
    assert!(h.locks.held().is_empty());
    assert_eq!(h.qm.active_batches(), 0);
    assert_eq!(h.qm.modems().get("ttyS0").map(|m| m.state), Some(ModemState::Ready));
    // Done is only reported when asked for
    assert!(h.notify.calls().is_empty());
}

#[tokio::test]
async fn busy_line_requeues_with_jitter() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    let now = h.clock.now().timestamp();
    h.finish_send(pid, 0x0101).await;

    let req = h.record(&id);
    assert_eq!(req.state, JobState::Sleeping);
    assert_eq!((req.ndials, req.totdials, req.ntries), (1, 1, 0));
    let busy = 180;
    assert!(req.tts >= now + busy / 2 && req.tts <= now + busy * 3 / 2, "tts {} now {now}", req.tts);
    assert_eq!(req.status, "Call failed: busy");
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
    assert!(h.locks.held().is_empty());
}

#[tokio::test]
async fn permanent_failure_reports_sender_output() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    assert!(h.procs.finish(pid, 0x0502, "remote refused document\n"));
    h.complete_next().await;

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "remote refused document");
    assert_eq!(req.ntries, 1);
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::Failed]);
}

#[tokio::test]
async fn concurrency_limit_blocks_then_releases() {
    let mut cfg = config();
    cfg.modems.push("ttyS1".to_string());
    let mut h = harness_with(cfg, SingleJobPolicy);
    let first = h.write_job("1", |_| {});
    let second = h.write_job("2", |_| {});
    h.submit(&first).await;
    h.submit(&second).await;

    h.qm.run_scheduler();
    h.qm.flush().await;
    assert_eq!(h.qm.active_batches(), 1);
    assert_eq!(h.slot(&second), Some(Slot::Blocked));
    assert_eq!(h.record(&second).state, JobState::Blocked);
    assert_eq!(h.notify.reasons_for("sendq/q2"), vec![NotifyReason::Blocked]);

    // A second pass does not notify again
    h.qm.run_scheduler();
    h.qm.flush().await;
    assert_eq!(h.notify.reasons_for("sendq/q2").len(), 1);

    let pid = h.spawned("faxsend", 1).await[0];
    h.finish_send(pid, 0).await;
    assert_eq!(h.slot(&second), Some(Slot::Ready));
    assert_eq!(h.record(&second).state, JobState::Ready);

    h.qm.run_scheduler();
    assert_eq!(h.spawned("faxsend", 2).await.len(), 2);
}

#[tokio::test]
async fn one_modem_serves_one_batch() {
    let mut h = harness_with(config(), SingleJobPolicy);
    let a = h.write_job("1", |_| {});
    let b = h.write_job("2", |req| req.number = "5550199".to_string());
    h.submit(&a).await;
    h.submit(&b).await;

    h.qm.run_scheduler();
    assert_eq!(h.qm.active_batches(), 1);
    assert_eq!(h.procs.spawned().len(), 1);
    let modem = h.qm.modems().get("ttyS0").unwrap();
    assert!(modem.batch.is_some());
    assert!(!modem.is_available());

    // Exactly one of the two is waiting on its queue
    let slots = [h.slot(&a), h.slot(&b)];
    assert_eq!(slots.iter().filter(|s| **s == Some(Slot::Ready)).count(), 1);
    assert_eq!(slots.iter().filter(|s| **s == Some(Slot::None)).count(), 1);
}

#[tokio::test]
async fn compatible_jobs_share_a_call() {
    let mut h = harness(config());
    let a = h.write_job("1", |_| {});
    let b = h.write_job("2", |_| {});
    let c = h.write_job("3", |req| req.resolution = 196);
    for id in [&a, &b, &c] {
        h.submit(id).await;
    }
    h.qm.run_scheduler();

    let (_, spec) = h.procs.spawned().into_iter().next().unwrap();
    assert_eq!(spec.args, ["-m", "ttyS0", "sendq/q1", "sendq/q2"]);
    assert_eq!(h.slot(&c), Some(Slot::Ready));
}

#[tokio::test]
async fn shared_document_is_imaged_once() {
    let mut h = harness(config());
    let docq = h.spool.docq();
    let base = docq.join("doc.ps");
    std::fs::write(&base, "%!PS\n").unwrap();
    for n in ["1", "2"] {
        std::fs::hard_link(&base, docq.join(format!("doc.ps.{n}"))).unwrap();
        let id = h.write_job(n, |req| {
            req.items = vec![DocOp::new(OpKind::PostScript, format!("docq/doc.ps.{n}"))];
        });
        h.submit(&id).await;
    }
    h.qm.run_scheduler();

    let converters = h.spawned("ps2fax", 1).await;
    let imaged = docq.join("doc.ps;r98w209l296");
    std::fs::write(&imaged, b"imaged pages").unwrap();
    assert!(h.procs.finish(converters[0], 0, ""));
    h.complete_next().await;
    h.complete_next().await;

    assert_eq!(h.spawned("ps2fax", 1).await.len(), 1);
    for id in [JobId::new("1"), JobId::new("2")] {
        let req = h.record(&id);
        assert_eq!(req.items[0].op, OpKind::PostScriptSaved);
        assert_eq!(req.items[1], DocOp::new(OpKind::Fax, "docq/doc.ps;r98w209l296"));
        assert_eq!(req.pagehandling, "PE");
    }

    let send = h.spawned("faxsend", 1).await[0];
    h.finish_send(send, 0).await;

    assert!(!imaged.exists());
    assert!(base.exists());
    assert!(!docq.join("doc.ps.1").exists());
    assert!(!docq.join("doc.ps.2").exists());
}

#[tokio::test]
async fn failed_conversion_ends_the_job() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| {
        req.items = vec![DocOp::new(OpKind::Pdf, "docq/doc.pdf")];
    });
    h.submit(&id).await;
    h.qm.run_scheduler();

    let pid = h.spawned("pdf2fax", 1).await[0];
    assert!(h.procs.finish(pid, 1, "bad xref table"));
    h.complete_next().await;

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "bad xref table");
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::FormatFailed]);
    assert!(!h.spool.docq().join("doc.pdf;r98w209l296").exists());
    assert!(h.locks.held().is_empty());
}

#[tokio::test]
async fn held_device_lock_is_polled() {
    let mut h = harness(config());
    h.locks.set_foreign("ttyS0", true);
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;

    h.qm.run_scheduler();
    assert!(h.procs.spawned().is_empty());
    assert_eq!(h.qm.modems().get("ttyS0").map(|m| m.state), Some(ModemState::Busy));
    assert_eq!(h.slot(&id), Some(Slot::Ready));

    h.locks.set_foreign("ttyS0", false);
    h.clock.advance(Duration::from_secs(31));
    h.qm.tick().await;

    assert_eq!(h.spawned("faxsend", 1).await.len(), 1);
    assert_eq!(h.qm.job(&id).and_then(|j| j.modem.clone()), Some("ttyS0".to_string()));
}

#[tokio::test]
async fn suspend_and_resume() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;

    assert_eq!(h.qm.handle_command(Command::Suspend(id.clone()), None).await, Ack::Ok('U'));
    assert_eq!(h.slot(&id), Some(Slot::Suspended));
    assert_eq!(h.record(&id).state, JobState::Suspended);
    assert_eq!(h.qm.handle_command(Command::Suspend(id.clone()), None).await, Ack::Err('U'));

    h.qm.run_scheduler();
    assert!(h.procs.spawned().is_empty());

    assert_eq!(h.submit(&id).await, Ack::Ok('S'));
    assert_eq!(h.slot(&id), Some(Slot::Ready));
    assert_eq!(h.submit(&id).await, Ack::Err('S'));
}

#[tokio::test]
async fn kill_during_send_waits_for_the_sender() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    assert_eq!(h.qm.handle_command(Command::Kill(id.clone()), None).await, Ack::Ok('K'));
    assert!(h.procs.calls().contains(&fq_adapters::ProcessCall::Terminate { pid }));

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Job killed by request");
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::Killed]);
    assert_eq!(h.qm.active_batches(), 0);
}

#[tokio::test]
async fn remove_of_queued_job() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.doneop = fq_core::DoneOp::Remove);
    h.submit(&id).await;

    assert_eq!(h.qm.handle_command(Command::Remove(id.clone()), None).await, Ack::Ok('R'));
    assert!(!h.spool.qfile(&id).exists());
    assert!(!h.spool.done_qfile(&id).exists());
    assert_eq!(h.notify.reasons_for("sendq/q1"), vec![NotifyReason::Removed]);
    assert_eq!(
        h.qm.handle_command(Command::Remove(JobId::new("9")), None).await,
        Ack::Err('R')
    );
}

#[tokio::test]
async fn altered_record_is_rescheduled() {
    let mut h = harness(config());
    let later = (h.clock.now() + chrono::TimeDelta::seconds(3600)).timestamp();
    let id = h.write_job("1", |req| req.tts = later);
    h.submit(&id).await;
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));

    let mut req = h.record(&id);
    req.tts = 0;
    req.pri = 10;
    std::fs::write(h.spool.qfile(&id), req.to_text()).unwrap();

    assert_eq!(h.qm.handle_command(Command::Altered(id.clone()), None).await, Ack::Ok('A'));
    assert_eq!(h.slot(&id), Some(Slot::Ready));
    assert_eq!(h.qm.job(&id).map(|j| j.pri), Some(10));
}

#[tokio::test]
async fn trigger_receives_job_events_in_order() {
    let mut h = harness(config());
    let client = PathBuf::from("/tmp/fq-client");
    let spec = fq_core::TriggerSpec::parse("J*").unwrap();
    let ack = h.qm.handle_command(Command::TriggerCreate(spec.clone()), Some(&client)).await;
    assert!(matches!(ack, Ack::Trigger(_)));
    assert_eq!(h.qm.handle_command(Command::TriggerCreate(spec), None).await, Ack::Err('T'));

    let id = h.write_job("1", |_| {});
    h.submit(&id).await;

    let frames = h.fifo.sent_to(&client);
    let decoded: Vec<_> = frames.iter().map(|f| decode_event(f).unwrap().0).collect();
    let codes: Vec<_> = decoded.iter().map(|hdr| EventCode::from_code(hdr.code).unwrap()).collect();
    assert_eq!(codes, vec![EventCode::JobCreate, EventCode::JobReady]);
    assert!(decoded.windows(2).all(|w| w[0].seq < w[1].seq));

    // A reader that went away loses its trigger
    h.fifo.close(&client);
    h.qm.handle_command(Command::Suspend(id.clone()), None).await;
    let Ack::Trigger(trigger) = ack else { unreachable!() };
    assert_eq!(
        h.qm.handle_command(Command::TriggerCancel(trigger), None).await,
        Ack::Err('t')
    );
}

#[tokio::test]
async fn modem_status_changes_are_tracked() {
    let mut h = harness(config());
    let down = Command::ModemStatus {
        modem: "ttyS0".to_string(),
        state: ModemState::Down,
        group: None,
    };
    h.qm.handle_command(down, None).await;
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();
    assert!(h.procs.spawned().is_empty());

    let ready = Command::ModemStatus {
        modem: "ttyS0".to_string(),
        state: ModemState::Ready,
        group: None,
    };
    h.qm.handle_command(ready, None).await;
    h.clock.advance(Duration::from_secs(2));
    h.qm.tick().await;
    assert_eq!(h.spawned("faxsend", 1).await.len(), 1);
}

#[tokio::test]
async fn quit_stops_once_batches_drain() {
    let mut h = harness(config());
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    h.qm.handle_command(Command::Quit, None).await;
    h.clock.advance(Duration::from_secs(2));
    h.qm.tick().await;
    assert!(!h.qm.is_stopped());

    h.finish_send(pid, 0).await;
    h.clock.advance(Duration::from_secs(2));
    h.qm.tick().await;
    assert!(h.qm.is_stopped());
}

#[tokio::test]
async fn recover_picks_up_leftover_records() {
    let mut h = harness(config());
    let live = h.write_job("1", |req| req.state = JobState::Sleeping);
    let finished = h.write_job("2", |req| req.state = JobState::Done);
    let held = h.write_job("3", |req| req.state = JobState::Suspended);

    assert_eq!(h.qm.recover().await.unwrap(), 2);
    assert_eq!(h.slot(&live), Some(Slot::Ready));
    assert_eq!(h.slot(&held), Some(Slot::Suspended));
    assert!(h.qm.job(&finished).is_none());
    assert!(h.spool.done_qfile(&finished).exists());
}

#[tokio::test]
async fn dial_limit_rejects_at_submission() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| {
        req.ndials = 12;
    });
    h.submit(&id).await;

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Too many attempts to dial");
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::Rejected]);
}

#[tokio::test]
async fn unregistered_modem_is_rejected_at_submission() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.modem = "ttyNOPE".to_string());

    assert_eq!(h.submit(&id).await, Ack::Ok('S'));
    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Requested modem ttyNOPE is not registered");
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::Rejected]);

    h.qm.run_scheduler();
    assert!(h.procs.spawned().is_empty());
}

#[tokio::test]
async fn known_modem_names_and_groups_are_accepted() {
    let mut cfg = config();
    cfg.modem_groups
        .insert("serial".to_string(), fq_core::config::Pattern::new("^ttyS").unwrap());
    let mut h = harness(cfg);
    h.qm.handle_command(
        Command::ModemStatus {
            modem: "ttyS1".to_string(),
            state: ModemState::Ready,
            group: Some("fast".to_string()),
        },
        None,
    )
    .await;

    let by_id = h.write_job("1", |req| req.modem = "ttyS0".to_string());
    let by_pattern = h.write_job("2", |req| req.modem = "serial".to_string());
    let by_report = h.write_job("3", |req| req.modem = "fast".to_string());
    for id in [&by_id, &by_pattern, &by_report] {
        h.submit(id).await;
        assert_eq!(h.slot(id), Some(Slot::Ready), "job {id}");
    }
}

#[tokio::test]
async fn recovered_job_keeps_a_modem_not_yet_reported() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| {
        req.modem = "ttyS9".to_string();
        req.state = JobState::Ready;
    });

    assert_eq!(h.qm.recover().await.unwrap(), 1);
    assert_eq!(h.slot(&id), Some(Slot::Ready));
}

#[tokio::test]
async fn huge_retry_time_does_not_overflow() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.retrytime = 1_000_000_000_000_000);
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    h.finish_send(pid, 0x0101).await;

    let req = h.record(&id);
    assert_eq!(req.state, JobState::Sleeping);
    assert_eq!(req.tts, chrono::DateTime::<chrono::Utc>::MAX_UTC.timestamp());
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
}

#[tokio::test]
async fn far_future_kill_time_is_not_expired() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.killtime = 10_000_000_000_000);

    h.submit(&id).await;
    assert_eq!(h.slot(&id), Some(Slot::Ready));
    assert_eq!(h.record(&id).state, JobState::Ready);
}

#[tokio::test]
async fn far_future_send_time_sleeps() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.tts = 10_000_000_000_000);

    h.submit(&id).await;
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
    h.qm.run_scheduler();
    assert!(h.procs.spawned().is_empty());
}

#[tokio::test]
async fn stopping_one_job_does_not_charge_its_batch_mates() {
    let mut h = harness(config());
    let a = h.write_job("1", |_| {});
    let b = h.write_job("2", |_| {});
    h.submit(&a).await;
    h.submit(&b).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    assert_eq!(h.qm.handle_command(Command::Kill(a.clone()), None).await, Ack::Ok('K'));
    assert!(h.procs.calls().contains(&fq_adapters::ProcessCall::Terminate { pid }));
    assert_eq!(h.done_record(&a).state, JobState::Failed);

    let req = h.record(&b);
    assert_eq!(req.state, JobState::Ready);
    assert_eq!((req.ndials, req.totdials, req.ntries), (0, 0, 0));
    assert_eq!(h.slot(&b), Some(Slot::Ready));
}

#[tokio::test]
async fn kill_time_during_send_waits_for_the_attempt() {
    let mut h = harness(config());
    let deadline = (h.clock.now() + chrono::TimeDelta::seconds(60)).timestamp();
    let id = h.write_job("1", |req| req.killtime = deadline);
    h.submit(&id).await;
    h.qm.run_scheduler();
    let pid = h.spawned("faxsend", 1).await[0];

    h.clock.advance(Duration::from_secs(61));
    h.qm.tick().await;
    // Only marked; the sender keeps running
    assert_eq!(h.qm.job(&id).map(|j| j.expired), Some(true));
    assert_eq!(h.slot(&id), Some(Slot::None));
    assert_eq!(h.record(&id).state, JobState::Active);
    assert!(!h.procs.calls().contains(&fq_adapters::ProcessCall::Terminate { pid }));

    h.finish_send(pid, 0x0101).await;
    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Kill time expired");
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::TimedOut]);
}

#[tokio::test]
async fn sender_that_cannot_start_requeues_with_jitter() {
    let mut h = harness(config());
    h.procs.fail_spawn("faxsend");
    let id = h.write_job("1", |_| {});
    h.submit(&id).await;

    let now = h.clock.now().timestamp();
    h.qm.run_scheduler();

    let req = h.record(&id);
    assert_eq!(req.state, JobState::Sleeping);
    assert!(req.status.starts_with("Could not start send"), "{}", req.status);
    let fork = 30;
    assert!(req.tts >= now + fork / 2 && req.tts <= now + fork * 3 / 2, "tts {} now {now}", req.tts);
    assert_eq!((req.ndials, req.ntries), (0, 0));
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
    assert_eq!(h.qm.active_batches(), 0);
    assert!(h.locks.held().is_empty());
}

#[tokio::test]
async fn time_of_day_window_puts_the_head_to_sleep() {
    use chrono::Timelike;

    let mut h = harness(config());
    let now = h.clock.now();
    let hour = (now.with_timezone(&chrono::Local).hour() + 2) % 24;
    let window = format!("Any{hour:02}00-{hour:02}30");
    let set = Command::ConfigSet {
        key: "time_of_day".to_string(),
        value: window.clone(),
    };
    assert_eq!(h.qm.handle_command(set, None).await, Ack::Ok('C'));
    let opens = fq_core::TimeOfDay::parse(&window)
        .unwrap()
        .next_allowed_in(now, &chrono::Local)
        .unwrap();

    let id = h.write_job("1", |_| {});
    h.submit(&id).await;
    h.qm.run_scheduler();

    assert!(h.procs.spawned().is_empty());
    assert_eq!(h.slot(&id), Some(Slot::Sleeping));
    assert_eq!(h.qm.job(&id).map(|j| j.tts), Some(opens));
    assert!(h.qm.next_wakeup().is_some_and(|at| at <= opens));

    h.clock.set(opens);
    h.qm.tick().await;
    assert_eq!(h.spawned("faxsend", 1).await.len(), 1);
}

#[tokio::test]
async fn failed_preparation_leaves_the_rest_of_the_batch() {
    let mut h = harness(config());
    let plain = h.write_job("1", |_| {});
    let broken = h.write_job("2", |req| {
        req.items = vec![DocOp::new(OpKind::Pdf, "docq/doc.pdf")];
    });
    h.submit(&plain).await;
    h.submit(&broken).await;
    h.qm.run_scheduler();

    let converter = h.spawned("pdf2fax", 1).await[0];
    assert!(h.procs.spawned().iter().all(|(_, spec)| spec.name() != "faxsend"));
    assert!(h.procs.finish(converter, 1, "bad xref table"));
    h.complete_next().await;

    let req = h.done_record(&broken);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(h.notify.reasons_for("doneq/q2"), vec![NotifyReason::FormatFailed]);

    let send = h.spawned("faxsend", 1).await[0];
    let (_, spec) = h.procs.spawned().into_iter().find(|(p, _)| *p == send).unwrap();
    assert_eq!(spec.args, ["-m", "ttyS0", "sendq/q1"]);
    h.finish_send(send, 0).await;
    assert_eq!(h.done_record(&plain).state, JobState::Done);
}

#[tokio::test]
async fn dial_limit_ends_a_job_after_repeated_busy_lines() {
    let mut h = harness(config());
    let id = h.write_job("1", |req| req.maxdials = 2);
    h.submit(&id).await;
    h.qm.run_scheduler();

    for attempt in 1..=2 {
        let pid = h.spawned("faxsend", attempt).await[attempt - 1];
        h.finish_send(pid, 0x0101).await;
        assert_eq!(h.record(&id).ndials, attempt as u16);
        h.clock.advance(Duration::from_secs(300));
        h.qm.tick().await;
    }

    let req = h.done_record(&id);
    assert_eq!(req.state, JobState::Failed);
    assert_eq!(req.status, "Too many attempts to dial");
    assert_eq!(req.ndials, 2);
    assert_eq!(h.procs.spawned().len(), 2);
    assert_eq!(h.notify.reasons_for("doneq/q1"), vec![NotifyReason::Failed]);
}
