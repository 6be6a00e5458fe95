// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue manager: owner of every job, queue, batch and modem
//!
//! All state changes happen on `&mut self` from one task. Slow work runs in
//! supervised tasks whose results come back through [`Completion`]s; events
//! and notifications produced while handling something are delivered when
//! the handler finishes.

mod commands;
mod lifecycle;
mod scheduler;

use crate::batch::{Batch, BatchId, BatchPolicy, DefaultBatchPolicy};
use crate::dest::{DestQueue, RunQueue};
use crate::job::{Job, Slot};
use crate::modem::ModemRegistry;
use crate::supervisor::{Completion, Supervisor};
use crate::timers::{PassTrigger, TimerKey, Timers};
use crate::triggers::TriggerRegistry;
use crate::EngineError;
use chrono::{DateTime, Utc};
use fq_adapters::{FifoAdapter, LockAdapter, Notice, NotifyAdapter, NotifyReason, ProcessAdapter};
use fq_core::{
    Ack, Clock, Command, ConfigSource, EventCode, EventPayload, FaxRequest, JobId, JobSnapshot, ModemState,
    SlotAllocator,
};
use fq_storage::{DocCache, Spool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

/// Adapter dependencies of the queue manager
pub struct QueueDeps<P, L, N, F> {
    pub procs: P,
    pub locks: L,
    pub notify: N,
    pub fifo: F,
}

pub struct QueueManager<P, L, N, F: FifoAdapter, C: Clock> {
    spool: Spool,
    config: ConfigSource,
    clock: C,
    procs: P,
    locks: L,
    notify: N,
    policy: Box<dyn BatchPolicy>,

    jobs: HashMap<JobId, Job>,
    dests: HashMap<String, DestQueue>,
    runq: RunQueue,
    dead: Vec<JobId>,
    batches: HashMap<BatchId, Batch>,
    batch_ids: SlotAllocator,
    modems: ModemRegistry,
    docs: DocCache,

    timers: Timers,
    pass: PassTrigger,
    triggers: TriggerRegistry<F>,
    supervisor: Supervisor,
    /// Converter pid of each job being prepared (0 between converters)
    prep_pids: HashMap<JobId, Arc<AtomicU32>>,
    notices: Vec<Notice>,
    /// Insertion counter for ready queues
    seq: u64,
    in_pass: bool,
    shutdown: bool,
    stopped: bool,
}

impl<P, L, N, F, C> QueueManager<P, L, N, F, C>
where
    P: ProcessAdapter,
    L: LockAdapter,
    N: NotifyAdapter,
    F: FifoAdapter,
    C: Clock,
{
    pub fn new(spool: Spool, config: ConfigSource, deps: QueueDeps<P, L, N, F>, clock: C) -> Self {
        let mut modems = ModemRegistry::new();
        for id in &config.config().modems {
            modems.update(id, ModemState::Ready, None);
        }
        Self {
            spool,
            config,
            clock,
            procs: deps.procs,
            locks: deps.locks,
            notify: deps.notify,
            policy: Box::new(DefaultBatchPolicy),
            jobs: HashMap::new(),
            dests: HashMap::new(),
            runq: RunQueue::new(),
            dead: Vec::new(),
            batches: HashMap::new(),
            batch_ids: SlotAllocator::default(),
            modems,
            docs: DocCache::new(),
            timers: Timers::new(),
            pass: PassTrigger::default(),
            triggers: TriggerRegistry::new(deps.fifo),
            supervisor: Supervisor::new(),
            prep_pids: HashMap::new(),
            notices: Vec::new(),
            seq: 0,
            in_pass: false,
            shutdown: false,
            stopped: false,
        }
    }

    /// Replace the batching policy
    pub fn with_policy(mut self, policy: impl BatchPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    pub fn config(&self) -> &ConfigSource {
        &self.config
    }

    /// Whether a requested shutdown has completed
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn dest(&self, dest: &str) -> Option<&DestQueue> {
        self.dests.get(dest)
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub fn modems(&self) -> &ModemRegistry {
        &self.modems
    }

    pub fn active_batches(&self) -> usize {
        self.batches.len()
    }

    /// When the loop should next call [`QueueManager::tick`]
    pub fn next_wakeup(&mut self) -> Option<DateTime<Utc>> {
        match (self.timers.next_deadline(), self.pass.scheduled()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Wait for the next supervised task to finish
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.supervisor.recv().await
    }

    /// Handle one command line's command, returning the acknowledgement
    pub async fn handle_command(&mut self, cmd: Command, reply: Option<&Path>) -> Ack {
        let code = cmd.code();
        let result = self.dispatch(cmd, reply).await;
        self.flush().await;
        match result {
            Ok(Some(trigger)) => Ack::Trigger(trigger),
            Ok(None) => Ack::Ok(code),
            Err(e) => {
                tracing::warn!(command = %code, error = %e, "command failed");
                Ack::Err(code)
            }
        }
    }

    pub async fn handle_completion(&mut self, completion: Completion) {
        self.complete(completion);
        self.flush().await;
    }

    /// Fire due timers, then run a scheduler pass if one is due
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        for key in self.timers.poll(now) {
            self.fire(key);
        }
        if self.pass.is_due(self.clock.now()) {
            self.run_scheduler();
        }
        self.flush().await;
    }

    /// Pick up every record left in the send queue by an earlier run
    pub async fn recover(&mut self) -> Result<usize, EngineError> {
        let ids = self.spool.queued_jobs()?;
        let mut recovered = 0;
        for id in ids {
            match self.recover_job(&id) {
                Ok(true) => recovered += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(job_id = %id, error = %e, "cannot recover job"),
            }
        }
        self.flush().await;
        tracing::info!(recovered, "send queue recovered");
        Ok(recovered)
    }

    /// Ask for a scheduler pass soon
    fn poke(&mut self) {
        let now = self.clock.now();
        self.pass.request(now);
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Prepared { job, batch, prepared } => self.prep_done(&job, batch, prepared),
            Completion::Sent { batch, pid, output } => self.send_done(batch, pid, output),
        }
    }

    fn post(&mut self, code: EventCode, payload: EventPayload) {
        let now = self.clock.now();
        self.triggers.post(code, now, payload);
    }

    fn post_job(&mut self, code: EventCode, req: &FaxRequest) {
        self.post(code, EventPayload::Job(JobSnapshot::from(req)));
    }

    fn post_modem(&mut self, code: EventCode, modem: &str) {
        if let Some(m) = self.modems.get(modem) {
            let payload = EventPayload::Modem(m.snapshot());
            self.post(code, payload);
        }
    }

    /// Queue a notification if a hook is configured
    fn notify_user(&mut self, req: &FaxRequest, reason: NotifyReason, duration: Option<Duration>, next_tts: Option<i64>) {
        let Some(hook) = self.config.config().commands.notify.clone() else {
            return;
        };
        let record = if reason.is_terminal() && req.doneop == fq_core::DoneOp::Archive {
            self.spool.done_qfile(&req.jobid)
        } else {
            self.spool.qfile(&req.jobid)
        };
        let qfile = self.spool.relative(&record).display().to_string();
        self.notices.push(Notice {
            hook: crate::imager::resolve_command(self.spool.root(), &hook),
            qfile,
            reason,
            duration,
            next_tts,
        });
    }

    /// Deliver queued events and notifications
    async fn flush(&mut self) {
        self.triggers.flush().await;
        for notice in std::mem::take(&mut self.notices) {
            if let Err(e) = self.notify.notify(&notice).await {
                tracing::warn!(qfile = %notice.qfile, error = %e, "notification failed");
            }
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn arm(&mut self, key: TimerKey, at: DateTime<Utc>) {
        self.timers.set(key, at);
    }

    fn slot_of(&self, id: &JobId) -> Option<Slot> {
        self.jobs.get(id).map(|j| j.slot)
    }
}

#[cfg(test)]
#[path = "queue_manager_tests.rs"]
mod tests;
