// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler pass, batches and send results

use super::lifecycle::limit_violation;
use super::QueueManager;
use crate::batch::{Batch, BatchId};
use crate::imager::resolve_command;
use crate::prepare::{self, Prepared};
use crate::timers::TimerKey;
use chrono::Local;
use fq_adapters::{FifoAdapter, LockAdapter, NotifyAdapter, NotifyReason, ProcessAdapter, ProcessOutput, ProcessSpec};
use fq_core::{
    later, Clock, DestControls, EventCode, FaxRequest, JobId, JobState, JobType, ModemState, PrepStatus, SendOutcome,
    SendStatus,
};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

/// What a pass does after handling a destination's head job
enum Step {
    /// Look at the new head
    Next,
    /// Nothing more can start for this destination now
    Stop,
}

/// Remote capabilities reported by a sender asking for a reformat, one
/// `key=value` per whitespace separated token
fn parse_caps(stdout: &str) -> impl Iterator<Item = (String, String)> + '_ {
    stdout
        .split_whitespace()
        .filter_map(|tok| tok.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
}

impl<P, L, N, F, C> QueueManager<P, L, N, F, C>
where
    P: ProcessAdapter,
    L: LockAdapter,
    N: NotifyAdapter,
    F: FifoAdapter,
    C: Clock,
{
    /// Start whatever work the current queues and modems allow
    pub fn run_scheduler(&mut self) {
        if self.in_pass {
            tracing::error!("scheduler pass entered twice");
            return;
        }
        self.in_pass = true;
        let started = std::time::Instant::now();
        self.pass.ran(self.clock.now());

        match self.config.reload_if_changed() {
            Ok(true) => tracing::info!("configuration reloaded"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "configuration reload failed, keeping previous"),
        }

        for dest in self.runq.destinations() {
            if !self.modems.any_available() {
                break;
            }
            let mut started_call = false;
            while self.modems.any_available() {
                let active = self.dests.get(&dest).map_or(0, |d| d.active);
                match self.schedule_head(&dest) {
                    Step::Next => {
                        started_call |= self.dests.get(&dest).map_or(0, |d| d.active) > active;
                    }
                    Step::Stop => break,
                }
            }
            let pri = self.dests.get(&dest).and_then(|d| d.head_priority());
            if pri.is_none() || started_call {
                // Served destinations go behind their peers
                self.runq.reposition(&dest, pri);
            }
            self.gc_dest(&dest);
        }

        self.reap();
        if self.shutdown && self.batches.is_empty() && !self.stopped {
            self.stopped = true;
            tracing::info!("scheduler stopped");
        }
        self.in_pass = false;
        tracing::trace!(elapsed_ms = started.elapsed().as_millis() as u64, "scheduler pass");
    }

    fn schedule_head(&mut self, dest: &str) -> Step {
        let Some(id) = self.dests.get(dest).and_then(|d| d.head().cloned()) else {
            return Step::Stop;
        };
        // The record is authoritative; it may have been edited since submission
        let Some(mut req) = self.load(&id) else {
            self.drop_job(&id);
            return Step::Next;
        };
        let now = self.clock.now();
        let controls = self.config.config().controls_for(dest);

        if let Some(reason) = limit_violation(&req, &controls) {
            self.terminate(&id, &mut req, NotifyReason::Failed, reason);
            return Step::Next;
        }
        match controls.time_of_day.next_allowed_in(now, &Local) {
            Some(at) if at <= now => {}
            Some(at) => {
                tracing::debug!(job_id = %id, until = %at, "outside time-of-day window");
                self.unqueue(&id);
                self.sleep_until(&id, at);
                return Step::Next;
            }
            None => {
                self.terminate(&id, &mut req, NotifyReason::Failed, "Time of day restrictions never allow sending");
                return Step::Next;
            }
        }
        if !self
            .dests
            .get(dest)
            .is_some_and(|d| d.admits_call(controls.max_concurrent_calls))
        {
            self.block(&id);
            return Step::Next;
        }
        let Some(modem) = self.assign_modem(&req.modem) else {
            return Step::Stop;
        };
        self.start_batch(dest, &id, req, &modem, &controls);
        Step::Next
    }

    /// Lock the first free modem satisfying `constraint`. Modems whose
    /// device lock is held elsewhere are marked busy until the lock clears.
    fn assign_modem(&mut self, constraint: &str) -> Option<String> {
        let candidates = self
            .modems
            .candidates(constraint, &self.config.config().modem_groups);
        for modem in candidates {
            match self.locks.acquire(&modem) {
                Ok(true) => return Some(modem),
                Ok(false) => {}
                Err(e) => tracing::warn!(modem = %modem, error = %e, "cannot lock modem"),
            }
            self.modems.set_state(&modem, ModemState::Busy);
            self.post_modem(EventCode::ModemLocked, &modem);
            let at = later(self.clock.now(), self.lock_poll_interval());
            self.arm(TimerKey::LockPoll(modem), at);
        }
        None
    }

    fn start_batch(&mut self, dest: &str, lead: &JobId, lead_req: FaxRequest, modem: &str, controls: &DestControls) {
        let Some(n) = self.batch_ids.alloc() else {
            tracing::error!("no batch ids left");
            if let Err(e) = self.locks.release(modem) {
                tracing::warn!(modem, error = %e, "cannot unlock modem");
            }
            return;
        };
        let id = BatchId(n);
        let mut batch = Batch::new(id, dest, modem, lead_req.jobtype, self.clock.now());

        // Fold compatible ready jobs behind the lead
        let max = self.config.config().max_batch_jobs.max(1) as usize;
        let waiting: Vec<JobId> = self
            .dests
            .get(dest)
            .map(|d| d.ready_after_head().cloned().collect())
            .unwrap_or_default();
        let mut members = vec![(lead.clone(), lead_req)];
        for candidate in waiting {
            if members.len() >= max {
                break;
            }
            let Some(req) = self.load(&candidate) else {
                continue;
            };
            if limit_violation(&req, controls).is_none() && self.policy.compatible(&members[0].1, &req) {
                members.push((candidate, req));
            }
        }

        self.modems.assign(modem, id, lead);
        if let Some(dq) = self.dests.get_mut(dest) {
            dq.active += 1;
        }
        self.post_modem(EventCode::ModemAssign, modem);

        for (job_id, req) in &mut members {
            self.unqueue(job_id);
            if let Some(job) = self.jobs.get_mut(job_id) {
                job.batch = Some(id);
                job.modem = Some(modem.to_string());
                job.state = JobState::Active;
            }
            req.state = JobState::Active;
            self.save(job_id, req);
            self.post_job(EventCode::JobActive, req);
            batch.jobs.push(job_id.clone());
        }
        tracing::info!(batch = %id, dest, modem, jobs = batch.jobs.len(), "batch started");
        self.batches.insert(id, batch);

        for (job_id, req) in members {
            if !self.batches.contains_key(&id) {
                break;
            }
            self.prepare_job(id, &job_id, req);
        }
        self.advance_batch(id);
    }

    fn prepare_job(&mut self, batch: BatchId, id: &JobId, mut req: FaxRequest) {
        let Some(dest) = self.batches.get(&batch).map(|b| b.dest.clone()) else {
            return;
        };
        let caps = self.dests.get(&dest).map(|d| d.caps.clone()).unwrap_or_default();
        let config = self.config.config();
        let max_pages = config.controls_for(&dest).max_send_pages;
        let plan = prepare::plan(&req, self.spool.root(), &config.commands, max_pages, &caps);

        match plan {
            Err(status) => self.prep_failed(batch, id, req, status),
            Ok(plan) if !plan.needs_work() => {
                prepare::apply(&mut req, &Prepared::done());
                self.save(id, &req);
            }
            Ok(plan) => {
                if let Some(b) = self.batches.get_mut(&batch) {
                    b.preparing.insert(id.clone());
                }
                let pid = Arc::new(AtomicU32::new(0));
                self.prep_pids.insert(id.clone(), Arc::clone(&pid));
                self.post_job(EventCode::JobPrepBegin, &req);
                tracing::debug!(job_id = %id, images = plan.images.len(), "preparing job");
                let work = prepare::run(self.procs.clone(), plan, pid);
                self.supervisor.watch_prep(id.clone(), batch, work);
            }
        }
    }

    pub(super) fn prep_done(&mut self, id: &JobId, batch: BatchId, prepared: Prepared) {
        self.prep_pids.remove(id);
        for image in &prepared.imaged {
            let base = self.spool.resolve(&image.base);
            self.docs.register(&base, &self.spool.resolve(&image.item));
        }
        for image in &prepared.abandoned {
            let base = self.spool.resolve(&image.base);
            self.docs.abandon(&base, &self.spool.resolve(&image.item));
        }
        if let Some(b) = self.batches.get_mut(&batch) {
            b.preparing.remove(id);
        }

        let Some(mut req) = self.load(id) else {
            self.leave_batch(batch, id);
            self.drop_job(id);
            self.advance_batch(batch);
            return;
        };
        self.post_job(EventCode::JobPrepEnd, &req);
        if prepared.status.is_done() {
            prepare::apply(&mut req, &prepared);
            self.save(id, &req);
        }
        let pending = self.jobs.get_mut(id).and_then(|j| j.pending.take());
        if let Some(action) = pending {
            self.leave_batch(batch, id);
            self.apply_action(id, &mut req, action);
        } else if !prepared.status.is_done() {
            self.prep_failed(batch, id, req, prepared.status);
        }
        self.advance_batch(batch);
    }

    /// Pull a job whose preparation failed out of its batch
    fn prep_failed(&mut self, batch: BatchId, id: &JobId, mut req: FaxRequest, status: PrepStatus) {
        self.leave_batch(batch, id);
        tracing::info!(job_id = %id, status = status.message(), "preparation failed");
        match status {
            PrepStatus::Done => {}
            PrepStatus::Rejected(msg) => self.terminate(id, &mut req, NotifyReason::Rejected, &msg),
            PrepStatus::FormatFailed(msg) => self.terminate(id, &mut req, NotifyReason::FormatFailed, &msg),
            PrepStatus::NoFormatter(msg) => self.terminate(id, &mut req, NotifyReason::NoFormatter, &msg),
            PrepStatus::Retry(msg) => {
                req.status = msg;
                let delay = self.config.config().requeue.fork;
                self.requeue(id, &mut req, delay);
            }
            PrepStatus::Requeued => self.ready_again(id, &mut req),
        }
    }

    /// Detach a job from its batch; the batch itself is left for
    /// [`QueueManager::advance_batch`]
    pub(super) fn leave_batch(&mut self, batch: BatchId, id: &JobId) {
        if let Some(b) = self.batches.get_mut(&batch) {
            b.remove(id);
        }
        if let Some(job) = self.jobs.get_mut(id) {
            job.batch = None;
            job.modem = None;
            job.pid = None;
        }
    }

    /// Send once every member is prepared; finish when no member is left
    pub(super) fn advance_batch(&mut self, batch: BatchId) {
        let Some(b) = self.batches.get(&batch) else {
            return;
        };
        if b.jobs.is_empty() && b.pid.is_none() {
            self.finish_batch(batch);
        } else if b.ready_to_send() {
            self.send_batch(batch);
        }
    }

    fn send_batch(&mut self, batch: BatchId) {
        let Some(b) = self.batches.get(&batch) else {
            return;
        };
        let (jobs, modem, jobtype) = (b.jobs.clone(), b.modem.clone(), b.jobtype);
        for id in &jobs {
            if let Some(mut req) = self.load(id) {
                req.returned = None;
                req.callstatus = None;
                self.save(id, &req);
                self.post_job(EventCode::SendBegin, &req);
            }
        }

        let commands = &self.config.config().commands;
        let cmd = match jobtype {
            JobType::Facsimile => &commands.send_fax,
            JobType::Pager => &commands.send_page,
            JobType::Uucp => &commands.send_uucp,
        };
        let root = self.spool.root();
        let spec = ProcessSpec::new(resolve_command(root, cmd), root)
            .arg("-m")
            .arg(modem.clone())
            .args(jobs.iter().map(|id| format!("sendq/{}", id.qfile())));

        match self.procs.spawn(&spec) {
            Ok(child) => {
                let pid = child.pid;
                if let Some(b) = self.batches.get_mut(&batch) {
                    b.pid = Some(pid);
                }
                for id in &jobs {
                    if let Some(job) = self.jobs.get_mut(id) {
                        job.pid = Some(pid);
                    }
                }
                tracing::info!(batch = %batch, modem = %modem, pid, jobs = jobs.len(), "send started");
                self.supervisor.watch_send(batch, child);
            }
            Err(e) => {
                tracing::warn!(batch = %batch, modem = %modem, error = %e, "cannot start send");
                let delay = self.config.config().requeue.fork;
                for id in &jobs {
                    self.leave_batch(batch, id);
                    match self.load(id) {
                        Some(mut req) => {
                            req.status = format!("Could not start send: {e}");
                            self.requeue(id, &mut req, delay);
                        }
                        None => self.drop_job(id),
                    }
                }
                self.finish_batch(batch);
            }
        }
    }

    pub(super) fn send_done(&mut self, batch: BatchId, pid: u32, output: ProcessOutput) {
        let Some(b) = self.batches.get(&batch) else {
            tracing::warn!(batch = %batch, pid, "send finished for unknown batch");
            return;
        };
        if b.pid != Some(pid) {
            tracing::warn!(batch = %batch, pid, "send finished for stale pid");
            return;
        }
        let outcome = SendOutcome::from_exit_code(output.code);
        let elapsed_ms = (self.clock.now() - b.started).num_milliseconds();
        tracing::info!(
            batch = %batch,
            pid,
            code = ?output.code,
            call = %outcome.call,
            elapsed_ms,
            "send finished"
        );
        // A user stop of one member ended the call early for all of them
        let interrupted = b
            .jobs
            .iter()
            .any(|id| self.jobs.get(id).is_some_and(|j| j.pending.is_some()));
        for id in b.jobs.clone() {
            self.job_sent(batch, &id, outcome, interrupted, &output.stdout);
        }
        self.finish_batch(batch);
    }

    /// Interpret one job's part of a send result. The scheduler owns the
    /// dial and try counters. Members of an `interrupted` call without a
    /// result of their own go back to the ready queue uncharged.
    fn job_sent(&mut self, batch: BatchId, id: &JobId, outcome: SendOutcome, interrupted: bool, stdout: &str) {
        self.leave_batch(batch, id);
        let Some(mut req) = self.load(id) else {
            self.drop_job(id);
            return;
        };
        let status = req.returned.unwrap_or(if interrupted {
            SendStatus::BatchFail
        } else {
            outcome.status
        });
        let call = req.callstatus.unwrap_or(outcome.call);
        if status != SendStatus::BatchFail {
            if call.answered() {
                req.ntries = req.ntries.saturating_add(1);
                req.tottries = req.tottries.saturating_add(1);
                req.ndials = 0;
            } else {
                req.ndials = req.ndials.saturating_add(1);
                req.totdials = req.totdials.saturating_add(1);
            }
        }
        self.post_job(EventCode::SendEnd, &req);

        let now = self.clock.now();
        let (expired, pending) = match self.jobs.get_mut(id) {
            Some(job) => (job.expired || job.is_expired_at(now), job.pending.take()),
            None => (false, None),
        };
        if status == SendStatus::Done {
            self.post_job(EventCode::SendDone, &req);
            self.terminate(id, &mut req, NotifyReason::Done, "");
            return;
        }
        if let Some(action) = pending {
            self.save(id, &req);
            self.apply_action(id, &mut req, action);
            return;
        }

        match status {
            SendStatus::Done => {}
            SendStatus::Failed => {
                self.post_job(EventCode::SendFailed, &req);
                let msg = if req.status.is_empty() {
                    match stdout.trim() {
                        "" => "Send failed".to_string(),
                        text => text.to_string(),
                    }
                } else {
                    req.status.clone()
                };
                self.terminate(id, &mut req, NotifyReason::Failed, &msg);
            }
            _ if expired => self.terminate(id, &mut req, NotifyReason::TimedOut, "Kill time expired"),
            SendStatus::Retry => {
                self.post_job(EventCode::SendRequeue, &req);
                if req.status.is_empty() {
                    req.status = format!("Call failed: {call}");
                }
                let delay = if req.retrytime > 0 {
                    Duration::from_secs(req.retrytime.unsigned_abs())
                } else {
                    self.config.config().requeue.for_call(call)
                };
                self.requeue(id, &mut req, delay);
            }
            SendStatus::Reformat => {
                self.post_job(EventCode::SendReformat, &req);
                if let Some(dq) = self.dests.get_mut(&req.canonical) {
                    dq.caps.extend(parse_caps(stdout));
                }
                prepare::unsave(&mut req);
                self.ready_again(id, &mut req);
            }
            SendStatus::BatchFail => self.ready_again(id, &mut req),
        }
    }

    /// Back onto the ready queue at once, no penalty
    fn ready_again(&mut self, id: &JobId, req: &mut FaxRequest) {
        req.state = JobState::Ready;
        self.save(id, req);
        self.make_ready(id);
        self.post_job(EventCode::JobReady, req);
    }

    fn finish_batch(&mut self, batch: BatchId) {
        let Some(b) = self.batches.remove(&batch) else {
            return;
        };
        for id in &b.jobs {
            if let Some(job) = self.jobs.get_mut(id) {
                job.batch = None;
                job.modem = None;
                job.pid = None;
            }
        }
        self.modems.release(&b.modem);
        if let Err(e) = self.locks.release(&b.modem) {
            tracing::warn!(modem = %b.modem, error = %e, "cannot unlock modem");
        }
        self.post_modem(EventCode::ModemRelease, &b.modem);
        self.batch_ids.release(batch.0);
        if let Some(dq) = self.dests.get_mut(&b.dest) {
            dq.active = dq.active.saturating_sub(1);
        }
        self.unblock(&b.dest);
        self.gc_dest(&b.dest);
        self.poke();
        tracing::debug!(batch = %batch, dest = %b.dest, "batch finished");
    }
}
