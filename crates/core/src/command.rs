// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler command channel grammar
//!
//! Each line written to the scheduler FIFO is one command:
//!
//! ```text
//! <code>[@<reply-fifo>]:<arg>[:<arg>...]
//! ```
//!
//! When a reply FIFO is named, the scheduler answers with `<code>*\0` on
//! success or `<code>!\0` on failure. Trigger creation answers `T*<id>\0`.

use crate::record::JobId;
use crate::state::ModemState;
use crate::trigger::{TriggerError, TriggerSpec};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command line")]
    Empty,
    #[error("unknown command code {0:?}")]
    UnknownCode(char),
    #[error("command {code:?}: {reason}")]
    BadArgs { code: char, reason: String },
    #[error("command 'T': {0}")]
    Trigger(#[from] TriggerError),
}

/// A command line split into its envelope, before argument validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub code: char,
    pub reply: Option<PathBuf>,
    pub args: String,
}

impl CommandLine {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim_end_matches(['\n', '\r', '\0']);
        let mut chars = line.chars();
        let Some(code) = chars.next() else {
            return Err(CommandError::Empty);
        };
        let rest = chars.as_str();
        let (envelope, args) = rest.split_once(':').unwrap_or((rest, ""));
        let reply = match envelope.strip_prefix('@') {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            Some(_) => {
                return Err(CommandError::BadArgs {
                    code,
                    reason: "empty reply address".to_string(),
                })
            }
            None if envelope.is_empty() => None,
            None => {
                return Err(CommandError::BadArgs {
                    code,
                    reason: format!("unexpected {envelope:?} before ':'"),
                })
            }
        };
        Ok(Self {
            code,
            reply,
            args: args.to_string(),
        })
    }

    /// Validate the arguments for this command code
    pub fn command(&self) -> Result<Command, CommandError> {
        let code = self.code;
        let bad = |reason: &str| CommandError::BadArgs {
            code,
            reason: reason.to_string(),
        };
        let jobid = || {
            let id = self.args.trim();
            if id.is_empty() {
                Err(bad("missing job id"))
            } else {
                Ok(JobId::new(id))
            }
        };
        let cmd = match code {
            'S' => Command::Submit(jobid()?),
            'U' => Command::Suspend(jobid()?),
            'R' => Command::Remove(jobid()?),
            'K' => Command::Kill(jobid()?),
            'A' => Command::Altered(jobid()?),
            'T' => Command::TriggerCreate(TriggerSpec::parse(&self.args)?),
            't' => Command::TriggerCancel(
                self.args
                    .trim()
                    .parse()
                    .map_err(|_| bad("trigger id must be a number"))?,
            ),
            'C' => {
                let (key, value) = self.args.split_once(':').ok_or_else(|| bad("expected key:value"))?;
                if key.trim().is_empty() {
                    return Err(bad("missing configuration key"));
                }
                Command::ConfigSet {
                    key: key.trim().to_string(),
                    value: value.to_string(),
                }
            }
            '+' => {
                let mut parts = self.args.split(':');
                let modem = parts.next().unwrap_or_default();
                if modem.is_empty() {
                    return Err(bad("missing modem id"));
                }
                let state = parts
                    .next()
                    .and_then(|s| s.chars().next())
                    .and_then(ModemState::from_char)
                    .ok_or_else(|| bad("modem state must be R, B or D"))?;
                let group = parts.next().filter(|g| !g.is_empty()).map(str::to_string);
                Command::ModemStatus {
                    modem: modem.to_string(),
                    state,
                    group,
                }
            }
            'Q' => Command::Quit,
            other => return Err(CommandError::UnknownCode(other)),
        };
        Ok(cmd)
    }
}

/// A validated scheduler command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(JobId),
    Suspend(JobId),
    Remove(JobId),
    Kill(JobId),
    /// The record was edited; re-read and reschedule
    Altered(JobId),
    TriggerCreate(TriggerSpec),
    TriggerCancel(u32),
    ConfigSet {
        key: String,
        value: String,
    },
    ModemStatus {
        modem: String,
        state: ModemState,
        group: Option<String>,
    },
    Quit,
}

impl Command {
    pub fn code(&self) -> char {
        match self {
            Command::Submit(_) => 'S',
            Command::Suspend(_) => 'U',
            Command::Remove(_) => 'R',
            Command::Kill(_) => 'K',
            Command::Altered(_) => 'A',
            Command::TriggerCreate(_) => 'T',
            Command::TriggerCancel(_) => 't',
            Command::ConfigSet { .. } => 'C',
            Command::ModemStatus { .. } => '+',
            Command::Quit => 'Q',
        }
    }

    /// Render as a command line (newline terminated)
    pub fn to_line(&self, reply: Option<&str>) -> String {
        let args = match self {
            Command::Submit(id)
            | Command::Suspend(id)
            | Command::Remove(id)
            | Command::Kill(id)
            | Command::Altered(id) => id.to_string(),
            Command::TriggerCreate(spec) => spec.to_string(),
            Command::TriggerCancel(id) => id.to_string(),
            Command::ConfigSet { key, value } => format!("{key}:{value}"),
            Command::ModemStatus {
                modem,
                state,
                group,
            } => match group {
                Some(g) => format!("{modem}:{}:{g}", state.as_char()),
                None => format!("{modem}:{}", state.as_char()),
            },
            Command::Quit => String::new(),
        };
        match reply {
            Some(r) => format!("{}@{}:{}\n", self.code(), r, args),
            None => format!("{}:{}\n", self.code(), args),
        }
    }
}

/// Reply written back to a command's reply FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ok(char),
    Err(char),
    Trigger(u32),
}

impl Ack {
    pub fn to_bytes(self) -> Vec<u8> {
        let text = match self {
            Ack::Ok(code) => format!("{code}*\0"),
            Ack::Err(code) => format!("{code}!\0"),
            Ack::Trigger(id) => format!("T*{id}\0"),
        };
        text.into_bytes()
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?.trim_end_matches('\0');
        let mut chars = text.chars();
        let code = chars.next()?;
        match (chars.next()?, chars.as_str()) {
            ('*', "") => Some(Ack::Ok(code)),
            ('!', "") => Some(Ack::Err(code)),
            ('*', id) if code == 'T' => id.parse().ok().map(Ack::Trigger),
            _ => None,
        }
    }

    pub fn is_ok(self) -> bool {
        !matches!(self, Ack::Err(_))
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
