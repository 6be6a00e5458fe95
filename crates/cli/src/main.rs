// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! faxctl - control tool for the fax queue scheduler

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::client::FifoClient;
use crate::commands::Commands;
use fq_core::Ack;

#[derive(Parser)]
#[command(
    name = "faxctl",
    version,
    about = "Control the fax queue scheduler through its command FIFO"
)]
struct Cli {
    /// Spool directory served by faxqd
    #[arg(long, global = true, env = "FAXQ_SPOOL", default_value = "/var/spool/fax")]
    spool: PathBuf,

    /// Wait for the scheduler to acknowledge the command
    #[arg(long, short, global = true)]
    wait: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = FifoClient::open(&cli.spool)?;
    let command = cli.command.into_command();

    if !cli.wait {
        client.send(&command).await?;
        return Ok(());
    }

    match client.request(&command).await? {
        Ack::Ok(_) => println!("ok"),
        Ack::Trigger(id) => println!("trigger {id}"),
        Ack::Err(_) => {
            anyhow::bail!("scheduler rejected {}", command.to_line(None).trim_end())
        }
    }
    Ok(())
}
