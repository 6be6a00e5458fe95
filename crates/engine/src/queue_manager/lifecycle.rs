// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle: admission, queue moves, timers, suspension, termination

use super::QueueManager;
use crate::job::{Job, PendingAction, Slot};
use crate::timers::TimerKey;
use crate::EngineError;
use chrono::{DateTime, TimeDelta, Utc};
use fq_adapters::{FifoAdapter, LockAdapter, NotifyAdapter, NotifyReason, ProcessAdapter};
use fq_core::{
    delta, from_epoch, later, Clock, DestControls, EventCode, EventPayload, FaxRequest, JobId, JobSnapshot, JobState,
    ModemState, OpKind,
};
use fq_storage::{archive, base_name, read_record, write_record};
use rand::Rng;
use std::time::Duration;

/// Final state and event for each way a job can end
fn termination(reason: NotifyReason) -> (JobState, EventCode) {
    match reason {
        NotifyReason::Done => (JobState::Done, EventCode::JobDone),
        NotifyReason::Removed => (JobState::Done, EventCode::JobRemove),
        NotifyReason::Killed => (JobState::Failed, EventCode::JobKill),
        NotifyReason::TimedOut => (JobState::Failed, EventCode::JobTimedout),
        NotifyReason::Rejected => (JobState::Failed, EventCode::JobReject),
        NotifyReason::Failed
        | NotifyReason::FormatFailed
        | NotifyReason::NoFormatter
        | NotifyReason::Requeued
        | NotifyReason::Blocked => (JobState::Failed, EventCode::JobDone),
    }
}

/// Dial, try and page limits. Returns the reason the job may not be sent.
pub(super) fn limit_violation(req: &FaxRequest, controls: &DestControls) -> Option<&'static str> {
    if req.ndials >= req.maxdials.min(controls.max_dials) {
        return Some("Too many attempts to dial");
    }
    if req.ntries >= req.maxtries.min(controls.max_tries) {
        return Some("Too many attempts to transmit");
    }
    if req.totpages > controls.max_send_pages {
        return Some("Too many pages in submission");
    }
    None
}

fn snapshot(job: &Job) -> JobSnapshot {
    JobSnapshot {
        jobid: job.id.clone(),
        state: job.state,
        dest: job.dest.clone(),
        modem: job.modem.clone().unwrap_or_default(),
        pri: job.pri,
        tts: job.tts.timestamp(),
        killtime: job.killtime.map_or(0, |k| k.timestamp()),
        ntries: 0,
        ndials: 0,
        npages: 0,
        totpages: 0,
        status: String::new(),
    }
}

impl<P, L, N, F, C> QueueManager<P, L, N, F, C>
where
    P: ProcessAdapter,
    L: LockAdapter,
    N: NotifyAdapter,
    F: FifoAdapter,
    C: Clock,
{
    /// Accept a newly submitted record, or resume a suspended job
    pub(super) fn submit(&mut self, id: &JobId) -> Result<(), EngineError> {
        self.accept(id, true)
    }

    /// Modem servers report in after a restart, so recovered records are not
    /// held to the modems known at submission time
    fn accept(&mut self, id: &JobId, check_modem: bool) -> Result<(), EngineError> {
        if let Some(job) = self.jobs.get(id) {
            if job.slot == Slot::Suspended {
                return self.resume(id);
            }
            return Err(EngineError::AlreadyQueued(id.clone()));
        }

        let mut req = read_record(&self.spool.qfile(id))?;
        if req.state.is_terminal() {
            return Err(EngineError::InvalidState {
                id: id.clone(),
                state: req.state,
            });
        }
        let now = self.clock.now();
        let config = self.config.config();
        if !req.number.is_empty() {
            req.canonical = config.dial.canonical(&req.number);
        }
        let controls = config.controls_for(&req.canonical);
        if let Some(modem) = &controls.modem {
            if req.modem.is_empty() || req.modem.eq_ignore_ascii_case("any") {
                req.modem = modem.clone();
            }
        }

        let unknown_modem = check_modem
            && !config.modems.iter().any(|m| *m == req.modem)
            && !self.modems.knows(&req.modem, &config.modem_groups);

        self.jobs.insert(id.clone(), Job::from_record(&req, now));
        self.post_job(EventCode::JobCreate, &req);
        tracing::info!(job_id = %id, dest = %req.canonical, "job submitted");

        let rejection = if req.canonical.is_empty() {
            Some("Job has no destination".to_string())
        } else if unknown_modem {
            Some(format!("Requested modem {} is not registered", req.modem))
        } else {
            controls
                .reject_notice
                .clone()
                .or_else(|| limit_violation(&req, &controls).map(str::to_string))
        };
        if let Some(reason) = rejection {
            self.terminate(id, &mut req, NotifyReason::Rejected, &reason);
            return Ok(());
        }
        self.admit(id, &mut req);
        Ok(())
    }

    /// Put a suspended job back on its queues with its record's new values
    pub(super) fn resume(&mut self, id: &JobId) -> Result<(), EngineError> {
        let mut req = read_record(&self.spool.qfile(id))?;
        let now = self.clock.now();
        if let Some(job) = self.jobs.get_mut(id) {
            job.refresh(&req, now);
        }
        self.admit(id, &mut req);
        Ok(())
    }

    /// Queue a job by its times: expired jobs end, future ones sleep, the
    /// rest become ready. The job must be in the job table and on no queue.
    pub(super) fn admit(&mut self, id: &JobId, req: &mut FaxRequest) {
        let now = self.clock.now();
        let Some((tts, killtime)) = self.jobs.get(id).map(|j| (j.tts, j.killtime)) else {
            return;
        };
        if killtime.is_some_and(|k| k <= now) {
            self.terminate(id, req, NotifyReason::TimedOut, "Kill time expired");
            return;
        }
        if let Some(kill) = killtime {
            self.arm(TimerKey::Kill(id.clone()), kill);
        }

        if tts > now {
            req.state = JobState::Pending;
            if let Some(job) = self.jobs.get_mut(id) {
                job.state = JobState::Pending;
            }
            self.sleep_until(id, tts);
            self.save(id, req);
            self.post_job(EventCode::JobSleep, req);
        } else {
            req.state = JobState::Ready;
            self.make_ready(id);
            self.save(id, req);
            self.post_job(EventCode::JobReady, req);
        }
    }

    /// Pick up one record left over from an earlier run. Returns whether it
    /// is now known to the scheduler.
    pub(super) fn recover_job(&mut self, id: &JobId) -> Result<bool, EngineError> {
        let req = read_record(&self.spool.qfile(id))?;
        if req.state.is_terminal() {
            self.release_documents(&req);
            archive(&self.spool, &req)?;
            return Ok(false);
        }
        if req.state == JobState::Suspended {
            let mut job = Job::from_record(&req, self.clock.now());
            job.slot = Slot::Suspended;
            self.jobs.insert(id.clone(), job);
            return Ok(true);
        }
        self.accept(id, false)?;
        Ok(true)
    }

    /// Read a job's record, logging failures
    pub(super) fn load(&self, id: &JobId) -> Option<FaxRequest> {
        match read_record(&self.spool.qfile(id)) {
            Ok(req) => Some(req),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "cannot read job record");
                None
            }
        }
    }

    /// Commit a record, logging failures
    pub(super) fn save(&self, id: &JobId, req: &FaxRequest) {
        if let Err(e) = write_record(&self.spool.qfile(id), req) {
            tracing::warn!(job_id = %id, error = %e, "cannot write job record");
        }
    }

    /// Record a state change made outside the record
    pub(super) fn save_state(&self, id: &JobId, state: JobState) -> Option<FaxRequest> {
        let mut req = self.load(id)?;
        req.state = state;
        self.save(id, &req);
        Some(req)
    }

    pub(super) fn make_ready(&mut self, id: &JobId) {
        let seq = self.next_seq();
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        job.slot = Slot::Ready;
        job.state = JobState::Ready;
        let (dest, pri) = (job.dest.clone(), job.pri);
        let dq = self.dests.entry(dest.clone()).or_default();
        let before = dq.head_priority();
        dq.push_ready(id.clone(), pri, seq);
        let after = dq.head_priority();
        if before != after || !self.runq.contains(&dest) {
            self.runq.reposition(&dest, after);
        }
        self.poke();
    }

    pub(super) fn sleep_until(&mut self, id: &JobId, tts: DateTime<Utc>) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        job.slot = Slot::Sleeping;
        job.tts = tts;
        let dest = job.dest.clone();
        self.dests.entry(dest).or_default().push_sleeping(id.clone(), tts);
        self.arm(TimerKey::Tts(id.clone()), tts);
    }

    /// Take a job off whichever destination queue holds it
    pub(super) fn unqueue(&mut self, id: &JobId) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        let slot = std::mem::replace(&mut job.slot, Slot::None);
        if !matches!(slot, Slot::Ready | Slot::Sleeping | Slot::Blocked) {
            return;
        }
        let dest = job.dest.clone();
        if let Some(dq) = self.dests.get_mut(&dest) {
            let was_head = dq.head() == Some(id);
            dq.remove(id);
            if was_head {
                let pri = dq.head_priority();
                self.runq.reposition(&dest, pri);
            }
        }
        if slot == Slot::Sleeping {
            self.timers.cancel(&TimerKey::Tts(id.clone()));
            self.unblock(&dest);
        }
    }

    /// Park the ready head of its destination until a call slot frees up
    pub(super) fn block(&mut self, id: &JobId) {
        self.unqueue(id);
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        job.slot = Slot::Blocked;
        job.state = JobState::Blocked;
        let first = !std::mem::replace(&mut job.block_notified, true);
        let dest = job.dest.clone();
        self.dests.entry(dest.clone()).or_default().push_blocked(id.clone());
        tracing::debug!(job_id = %id, dest = %dest, "job blocked by concurrency limit");

        if let Some(req) = self.save_state(id, JobState::Blocked) {
            self.post_job(EventCode::JobBlocked, &req);
            if first {
                self.notify_user(&req, NotifyReason::Blocked, None, None);
            }
        }
    }

    /// Release blocked jobs of `dest` when another call would fit
    pub(super) fn unblock(&mut self, dest: &str) {
        let max = self.config.config().controls_for(dest).max_concurrent_calls;
        let Some(dq) = self.dests.get_mut(dest) else {
            return;
        };
        if dq.blocked_len() == 0 || !dq.admits_call(max) {
            return;
        }
        for id in dq.take_blocked() {
            self.make_ready(&id);
            if let Some(req) = self.save_state(&id, JobState::Ready) {
                self.post_job(EventCode::JobReady, &req);
            }
        }
    }

    /// Drop a destination that has nothing queued and no call running
    pub(super) fn gc_dest(&mut self, dest: &str) {
        if self.dests.get(dest).is_some_and(|dq| dq.is_idle()) {
            self.dests.remove(dest);
            self.runq.remove(dest);
        }
    }

    /// Sleep a job before another attempt.
    ///
    /// The send time is `now + d/2 + random(0..=d)` unless the sender
    /// already asked for a later time in the record. A retry that would
    /// start at or after the kill time ends the job instead.
    pub(super) fn requeue(&mut self, id: &JobId, req: &mut FaxRequest, delay: Duration) {
        let now = self.clock.now();
        let secs = delay.as_secs();
        let jitter = if secs == 0 {
            0
        } else {
            rand::rng().random_range(0..=secs)
        };
        let mut tts = later(now, delta(Duration::from_secs((secs / 2).saturating_add(jitter))));
        if req.tts > now.timestamp() {
            tts = tts.max(from_epoch(req.tts));
        }

        let killtime = self.jobs.get(id).and_then(|j| j.killtime);
        if killtime.is_some_and(|k| tts >= k) {
            self.terminate(id, req, NotifyReason::TimedOut, "Kill time expired");
            return;
        }

        req.tts = tts.timestamp();
        req.state = JobState::Sleeping;
        if let Some(job) = self.jobs.get_mut(id) {
            job.state = JobState::Sleeping;
        }
        self.sleep_until(id, tts);
        self.save(id, req);
        self.post_job(EventCode::JobRequeue, req);
        if req.notify.on_requeue() {
            let started = self.jobs.get(id).map(|j| j.start);
            let duration = started.and_then(|s| (now - s).to_std().ok());
            self.notify_user(req, NotifyReason::Requeued, duration, Some(req.tts));
        }
        tracing::info!(job_id = %id, tts = req.tts, status = %req.status, "job requeued");
    }

    pub(super) fn suspend(&mut self, id: &JobId, req: &mut FaxRequest) {
        self.unqueue(id);
        self.timers.cancel(&TimerKey::Tts(id.clone()));
        self.timers.cancel(&TimerKey::Kill(id.clone()));
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        job.slot = Slot::Suspended;
        job.state = JobState::Suspended;
        let dest = job.dest.clone();
        req.state = JobState::Suspended;
        self.save(id, req);
        self.post_job(EventCode::JobSuspend, req);
        self.gc_dest(&dest);
        tracing::info!(job_id = %id, "job suspended");
    }

    /// Carry out a user's suspend, remove or kill on a job that is on no
    /// batch
    pub(super) fn apply_action(&mut self, id: &JobId, req: &mut FaxRequest, action: PendingAction) {
        match action {
            PendingAction::Suspend => self.suspend(id, req),
            PendingAction::Remove => self.terminate(id, req, NotifyReason::Removed, "Job removed by request"),
            PendingAction::Kill => self.terminate(id, req, NotifyReason::Killed, "Job killed by request"),
        }
    }

    /// End a job: commit the record, release its documents, archive, notify
    /// and queue the job for reaping
    pub(super) fn terminate(&mut self, id: &JobId, req: &mut FaxRequest, reason: NotifyReason, status: &str) {
        let (state, event) = termination(reason);
        let now = self.clock.now();
        self.unqueue(id);
        self.timers.cancel(&TimerKey::Tts(id.clone()));
        self.timers.cancel(&TimerKey::Kill(id.clone()));

        req.state = state;
        if !status.is_empty() {
            req.status = status.to_string();
        }
        self.save(id, req);
        self.release_documents(req);
        if let Err(e) = archive(&self.spool, req) {
            tracing::warn!(job_id = %id, error = %e, "cannot archive job record");
        }

        let started = self.jobs.get(id).map(|j| j.start);
        if reason != NotifyReason::Done || req.notify.on_done() {
            let duration = started.and_then(|s| (now - s).to_std().ok());
            self.notify_user(req, reason, duration, None);
        }
        self.post_job(event, req);

        let mut dest = None;
        if let Some(job) = self.jobs.get_mut(id) {
            job.state = state;
            job.slot = Slot::Dead;
            job.batch = None;
            job.modem = None;
            job.pid = None;
            job.pending = None;
            dest = Some(job.dest.clone());
        }
        self.dead.push(id.clone());
        if let Some(dest) = dest {
            self.gc_dest(&dest);
        }
        tracing::info!(job_id = %id, state = %state, reason = reason.name(), status = %req.status, "job finished");
    }

    /// Forget a job whose record disappeared
    pub(super) fn drop_job(&mut self, id: &JobId) {
        self.unqueue(id);
        self.timers.cancel(&TimerKey::Tts(id.clone()));
        self.timers.cancel(&TimerKey::Kill(id.clone()));
        if let Some(job) = self.jobs.get_mut(id) {
            job.slot = Slot::Dead;
            let dest = job.dest.clone();
            self.dead.push(id.clone());
            self.gc_dest(&dest);
        }
    }

    /// Drop the job's references to its documents; imaged variants go once
    /// no job references their source any more
    pub(super) fn release_documents(&mut self, req: &FaxRequest) {
        for doc in &req.items {
            if doc.item.is_empty()
                || doc.item.contains(';')
                || matches!(doc.op, OpKind::Poll | OpKind::Page | OpKind::Uucp)
            {
                continue;
            }
            let link = self.spool.resolve(&doc.item);
            let base = self.spool.resolve(base_name(&doc.item, &req.jobid));
            if let Err(e) = self.docs.release(&link, &base) {
                tracing::warn!(job_id = %req.jobid, document = %doc.item, error = %e, "cannot release document");
            }
        }
        if !req.ccover.is_empty() {
            let cover = self.spool.resolve(&req.ccover);
            if let Err(e) = std::fs::remove_file(&cover) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %cover.display(), error = %e, "cannot remove cover page");
                }
            }
        }
    }

    /// Free jobs on the dead list
    pub(super) fn reap(&mut self) {
        for id in std::mem::take(&mut self.dead) {
            if let Some(job) = self.jobs.remove(&id) {
                self.post(EventCode::JobReap, EventPayload::Job(snapshot(&job)));
            }
        }
    }

    pub(super) fn fire(&mut self, key: TimerKey) {
        match key {
            TimerKey::Tts(id) => {
                if self.slot_of(&id) != Some(Slot::Sleeping) {
                    return;
                }
                self.unqueue(&id);
                self.make_ready(&id);
                if let Some(req) = self.save_state(&id, JobState::Ready) {
                    self.post_job(EventCode::JobReady, &req);
                }
            }
            TimerKey::Kill(id) => {
                let Some(job) = self.jobs.get_mut(&id) else {
                    return;
                };
                if matches!(job.slot, Slot::Dead | Slot::Suspended) {
                    return;
                }
                if job.in_batch() {
                    // Finish the attempt in flight; the result handler ends the job
                    job.expired = true;
                    tracing::debug!(job_id = %id, "kill time reached during an attempt");
                    return;
                }
                match self.load(&id) {
                    Some(mut req) => self.terminate(&id, &mut req, NotifyReason::TimedOut, "Kill time expired"),
                    None => self.drop_job(&id),
                }
            }
            TimerKey::LockPoll(modem) => {
                match self.locks.is_free(&modem) {
                    Ok(true) => {
                        self.modems.set_state(&modem, ModemState::Ready);
                        self.post_modem(EventCode::ModemReady, &modem);
                        self.poke();
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(modem = %modem, error = %e, "cannot test modem lock"),
                }
                let at = later(self.clock.now(), self.lock_poll_interval());
                self.arm(TimerKey::LockPoll(modem), at);
            }
        }
    }

    pub(super) fn lock_poll_interval(&self) -> TimeDelta {
        delta(self.config.config().lock_poll_interval)
    }
}
