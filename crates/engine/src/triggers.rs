// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger subscriptions and event delivery
//!
//! Events are posted synchronously while the scheduler mutates its state and
//! delivered in one batch afterwards, in posting order.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use fq_adapters::FifoAdapter;
use fq_core::event::encode_event;
use fq_core::{EventCode, EventPayload, SlotAllocator, TriggerSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Most triggers alive at once
pub const MAX_TRIGGERS: u32 = 1024;

#[derive(Debug, Clone)]
struct Trigger {
    spec: TriggerSpec,
    fifo: PathBuf,
}

#[derive(Debug, Clone)]
struct Posted {
    code: EventCode,
    at: DateTime<Utc>,
    payload: EventPayload,
}

pub struct TriggerRegistry<F: FifoAdapter> {
    fifo: F,
    ids: SlotAllocator,
    triggers: BTreeMap<u32, Trigger>,
    outbox: Vec<Posted>,
    seq: u32,
}

impl<F: FifoAdapter> TriggerRegistry<F> {
    pub fn new(fifo: F) -> Self {
        Self {
            fifo,
            ids: SlotAllocator::new(MAX_TRIGGERS),
            triggers: BTreeMap::new(),
            outbox: Vec::new(),
            seq: 0,
        }
    }

    /// Subscribe `fifo` to the events `spec` selects
    pub fn create(&mut self, spec: TriggerSpec, fifo: PathBuf) -> Result<u32, EngineError> {
        let id = self.ids.alloc().ok_or(EngineError::TooManyTriggers)?;
        tracing::info!(trigger = id, spec = %spec, fifo = %fifo.display(), "trigger created");
        self.triggers.insert(id, Trigger { spec, fifo });
        Ok(id)
    }

    pub fn cancel(&mut self, id: u32) -> Result<(), EngineError> {
        self.triggers.remove(&id).ok_or(EngineError::UnknownTrigger(id))?;
        self.ids.release(id);
        tracing::info!(trigger = id, "trigger cancelled");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Queue an event. Nothing is recorded when no trigger is listening.
    pub fn post(&mut self, code: EventCode, at: DateTime<Utc>, payload: EventPayload) {
        tracing::trace!(event = %code, subject = payload.subject(), "event");
        if self.triggers.is_empty() {
            return;
        }
        self.outbox.push(Posted { code, at, payload });
    }

    /// Deliver queued events. A subscriber whose reader is gone loses its
    /// trigger.
    pub async fn flush(&mut self) {
        let posted = std::mem::take(&mut self.outbox);
        for event in posted {
            let targets: Vec<(u32, PathBuf)> = self
                .triggers
                .iter()
                .filter(|(_, t)| t.spec.matches(event.code, event.payload.subject()))
                .map(|(id, t)| (*id, t.fifo.clone()))
                .collect();
            if targets.is_empty() {
                continue;
            }
            let seq = self.seq;
            self.seq = self.seq.wrapping_add(1);
            let frame = encode_event(seq, event.code, event.at.timestamp(), &event.payload);
            for (id, fifo) in targets {
                match self.fifo.send(&fifo, &frame).await {
                    Ok(()) => {}
                    Err(e) if e.is_gone() => {
                        tracing::info!(trigger = id, "trigger subscriber gone");
                        let _ = self.cancel(id);
                    }
                    Err(e) => tracing::warn!(trigger = id, error = %e, "event delivery failed"),
                }
            }
        }
    }
}
