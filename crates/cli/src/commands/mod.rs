// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command definitions

pub mod control;
pub mod job;

use clap::Subcommand;
use fq_core::Command;

use control::{ConfigArgs, ModemArgs};
use job::JobArgs;

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule a record already written to sendq/
    Submit(JobArgs),
    /// Take a job off the schedule without removing it
    Suspend(JobArgs),
    /// Remove a job that is not yet terminal
    Remove(JobArgs),
    /// Kill a job, terminating its sender if one is running
    Kill(JobArgs),
    /// Reschedule a job after its record was edited
    Alter(JobArgs),
    /// Override a configuration value until the next restart
    Config(ConfigArgs),
    /// Report a modem's status
    Modem(ModemArgs),
    /// Stop the scheduler once running batches finish
    Quit,
}

impl Commands {
    pub fn into_command(self) -> Command {
        match self {
            Commands::Submit(args) => Command::Submit(args.job_id()),
            Commands::Suspend(args) => Command::Suspend(args.job_id()),
            Commands::Remove(args) => Command::Remove(args.job_id()),
            Commands::Kill(args) => Command::Kill(args.job_id()),
            Commands::Alter(args) => Command::Altered(args.job_id()),
            Commands::Config(args) => args.into_command(),
            Commands::Modem(args) => args.into_command(),
            Commands::Quit => Command::Quit,
        }
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
