// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler-wide commands: configuration overrides and modem status

use clap::Args;
use fq_core::{Command, ModemState};

#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration key, e.g. max_concurrent_calls
    pub key: String,
    /// New value, parsed as the key's type
    pub value: String,
}

impl ConfigArgs {
    pub fn into_command(self) -> Command {
        Command::ConfigSet {
            key: self.key,
            value: self.value,
        }
    }
}

#[derive(Args)]
pub struct ModemArgs {
    /// Modem device id, e.g. ttyS0
    pub device: String,
    /// ready, busy or down (R, B, D)
    #[arg(value_parser = parse_modem_state)]
    pub state: ModemState,
    /// Group the modem belongs to
    pub group: Option<String>,
}

impl ModemArgs {
    pub fn into_command(self) -> Command {
        Command::ModemStatus {
            modem: self.device,
            state: self.state,
            group: self.group,
        }
    }
}

pub fn parse_modem_state(s: &str) -> Result<ModemState, String> {
    match s.to_ascii_lowercase().as_str() {
        "r" | "ready" => Ok(ModemState::Ready),
        "b" | "busy" => Ok(ModemState::Busy),
        "d" | "down" => Ok(ModemState::Down),
        _ => Err(format!("unknown modem state {s:?} (expected ready, busy or down)")),
    }
}
