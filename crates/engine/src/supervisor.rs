// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised child work
//!
//! Each send subprocess and each preparation task runs detached; when it ends
//! its result arrives on one channel as a typed [`Completion`] for the
//! scheduler to interpret.

use crate::batch::BatchId;
use crate::prepare::Prepared;
use fq_adapters::{Child, ProcessOutput};
use fq_core::JobId;
use std::future::Future;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Completion {
    /// A preparation task for one job of a batch finished
    Prepared {
        job: JobId,
        batch: BatchId,
        prepared: Prepared,
    },
    /// A batch's send subprocess exited
    Sent {
        batch: BatchId,
        pid: u32,
        output: ProcessOutput,
    },
}

pub struct Supervisor {
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    running: usize,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx, running: 0 }
    }

    /// Report the send child's exit for `batch`
    pub fn watch_send(&mut self, batch: BatchId, child: Child) {
        let tx = self.tx.clone();
        let pid = child.pid;
        self.running += 1;
        tokio::spawn(async move {
            let output = child.exit.await;
            let _ = tx.send(Completion::Sent { batch, pid, output });
        });
    }

    /// Run a preparation task for `job`
    pub fn watch_prep<F>(&mut self, job: JobId, batch: BatchId, work: F)
    where
        F: Future<Output = Prepared> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.running += 1;
        tokio::spawn(async move {
            let prepared = work.await;
            let _ = tx.send(Completion::Prepared { job, batch, prepared });
        });
    }

    /// Next completion. Pends forever when nothing is running.
    pub async fn recv(&mut self) -> Option<Completion> {
        let completion = self.rx.recv().await;
        if completion.is_some() {
            self.running = self.running.saturating_sub(1);
        }
        completion
    }

    /// Number of tasks that have not reported yet
    pub fn running(&self) -> usize {
        self.running
    }
}
