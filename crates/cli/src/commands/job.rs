// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Args;
use fq_core::JobId;

#[derive(Args)]
pub struct JobArgs {
    /// Job id (the record is sendq/q<ID>)
    pub id: String,
}

impl JobArgs {
    pub fn job_id(&self) -> JobId {
        JobId::new(self.id.trim())
    }
}
