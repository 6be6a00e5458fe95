// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command channel handling

use super::QueueManager;
use crate::job::{Job, PendingAction, Slot};
use crate::timers::TimerKey;
use crate::EngineError;
use fq_adapters::{FifoAdapter, LockAdapter, NotifyAdapter, ProcessAdapter};
use fq_core::{Clock, Command, EventCode, JobId, ModemState};
use fq_storage::read_record;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How long a user stop waits for the job's child to report
const STOP_TIMEOUT: Duration = Duration::from_secs(60);

impl<P, L, N, F, C> QueueManager<P, L, N, F, C>
where
    P: ProcessAdapter,
    L: LockAdapter,
    N: NotifyAdapter,
    F: FifoAdapter,
    C: Clock,
{
    /// Returns the id of a created trigger
    pub(super) async fn dispatch(&mut self, cmd: Command, reply: Option<&Path>) -> Result<Option<u32>, EngineError> {
        tracing::debug!(command = ?cmd, "command");
        match cmd {
            Command::Submit(id) => self.submit(&id)?,
            Command::Suspend(id) => self.stop_job(&id, PendingAction::Suspend).await?,
            Command::Remove(id) => self.stop_job(&id, PendingAction::Remove).await?,
            Command::Kill(id) => self.stop_job(&id, PendingAction::Kill).await?,
            Command::Altered(id) => self.alter(&id)?,
            Command::TriggerCreate(spec) => {
                let fifo = reply.ok_or(EngineError::NoTriggerFifo)?;
                let trigger = self.triggers.create(spec, fifo.to_path_buf())?;
                return Ok(Some(trigger));
            }
            Command::TriggerCancel(trigger) => self.triggers.cancel(trigger)?,
            Command::ConfigSet { key, value } => {
                self.config.set(&key, &value)?;
                self.poke();
            }
            Command::ModemStatus { modem, state, group } => self.modem_status(&modem, state, group.as_deref()),
            Command::Quit => {
                tracing::info!(batches = self.batches.len(), "shutdown requested");
                self.shutdown = true;
                self.poke();
            }
        }
        Ok(None)
    }

    /// Suspend, remove or kill a job. A job in the middle of an attempt has
    /// its child signalled, and the call returns once the job has left its
    /// batch.
    async fn stop_job(&mut self, id: &JobId, action: PendingAction) -> Result<(), EngineError> {
        let job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownJob(id.clone()))?;
        if job.slot == Slot::Dead || (job.slot == Slot::Suspended && action == PendingAction::Suspend) {
            return Err(EngineError::InvalidState {
                id: id.clone(),
                state: job.state,
            });
        }
        let Some(batch) = job.batch else {
            let mut req = read_record(&self.spool.qfile(id))?;
            self.apply_action(id, &mut req, action);
            return Ok(());
        };

        let send_pid = job.pid;
        let preparing = self.batches.get(&batch).is_some_and(|b| b.preparing.contains(id));
        if !preparing && send_pid.is_none() {
            // Prepared, waiting for the rest of its batch
            let mut req = read_record(&self.spool.qfile(id))?;
            self.leave_batch(batch, id);
            self.apply_action(id, &mut req, action);
            self.advance_batch(batch);
            return Ok(());
        }

        job.pending = Some(action);
        let pid = send_pid.or_else(|| {
            self.prep_pids
                .get(id)
                .map(|pid| pid.load(Ordering::SeqCst))
                .filter(|pid| *pid != 0)
        });
        if let Some(pid) = pid {
            tracing::info!(job_id = %id, pid, "stopping job child");
            self.procs.terminate(pid)?;
        }
        self.wait_for(id).await
    }

    /// Handle completions until `id` is no longer part of a batch
    async fn wait_for(&mut self, id: &JobId) -> Result<(), EngineError> {
        while self.jobs.get(id).is_some_and(Job::in_batch) {
            match tokio::time::timeout(STOP_TIMEOUT, self.supervisor.recv()).await {
                Ok(Some(completion)) => self.complete(completion),
                Ok(None) | Err(_) => return Err(EngineError::StopTimeout(id.clone())),
            }
        }
        Ok(())
    }

    /// Re-read an edited record and queue the job by its new values
    fn alter(&mut self, id: &JobId) -> Result<(), EngineError> {
        let job = self
            .jobs
            .get(id)
            .ok_or_else(|| EngineError::UnknownJob(id.clone()))?;
        if job.in_batch() || job.slot == Slot::Dead {
            return Err(EngineError::InvalidState {
                id: id.clone(),
                state: job.state,
            });
        }
        let mut req = read_record(&self.spool.qfile(id))?;
        let now = self.clock.now();
        self.unqueue(id);
        self.timers.cancel(&TimerKey::Tts(id.clone()));
        self.timers.cancel(&TimerKey::Kill(id.clone()));
        let dest = match self.jobs.get_mut(id) {
            Some(job) => {
                job.refresh(&req, now);
                job.dest.clone()
            }
            None => return Ok(()),
        };
        self.post_job(EventCode::JobAltered, &req);
        self.admit(id, &mut req);
        self.gc_dest(&dest);
        tracing::info!(job_id = %id, "job altered");
        Ok(())
    }

    fn modem_status(&mut self, modem: &str, state: ModemState, group: Option<&str>) {
        if self.modems.update(modem, state, group) {
            let code = match state {
                ModemState::Ready => EventCode::ModemReady,
                ModemState::Busy => EventCode::ModemBusy,
                ModemState::Down => EventCode::ModemDown,
            };
            self.post_modem(code, modem);
            tracing::info!(modem, state = ?state, "modem status changed");
        }
        if state == ModemState::Ready {
            self.poke();
        }
    }
}
