// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler configuration
//!
//! Loaded from `<spool>/etc/config.toml`. The file is re-read whenever its
//! modification time changes; values set at runtime through the command
//! channel are kept as overrides and re-applied on top of every reload.

mod job_control;

pub use job_control::{DestControls, JobControlRule, Pattern};

use crate::dial::DialRules;
use crate::record::DocKind;
use crate::status::CallStatus;
use crate::tod::TimeOfDay;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Base requeue delays per call outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequeueDelays {
    #[serde(with = "humantime_serde")]
    pub busy: Duration,
    #[serde(with = "humantime_serde")]
    pub no_carrier: Duration,
    #[serde(with = "humantime_serde")]
    pub no_answer: Duration,
    #[serde(with = "humantime_serde")]
    pub no_dialtone: Duration,
    #[serde(with = "humantime_serde")]
    pub error: Duration,
    #[serde(with = "humantime_serde")]
    pub failure: Duration,
    /// Protocol-level retry requested by the sender
    #[serde(with = "humantime_serde")]
    pub proto: Duration,
    /// Local trouble starting a child process
    #[serde(with = "humantime_serde")]
    pub fork: Duration,
}

impl Default for RequeueDelays {
    fn default() -> Self {
        Self {
            busy: Duration::from_secs(180),
            no_carrier: Duration::from_secs(300),
            no_answer: Duration::from_secs(300),
            no_dialtone: Duration::from_secs(120),
            error: Duration::from_secs(300),
            failure: Duration::from_secs(300),
            proto: Duration::from_secs(60),
            fork: Duration::from_secs(30),
        }
    }
}

impl RequeueDelays {
    pub fn for_call(&self, call: CallStatus) -> Duration {
        match call {
            CallStatus::Ok => self.proto,
            CallStatus::Busy => self.busy,
            CallStatus::NoCarrier => self.no_carrier,
            CallStatus::NoAnswer => self.no_answer,
            CallStatus::NoDialtone => self.no_dialtone,
            CallStatus::Error => self.error,
            CallStatus::Failure => self.failure,
        }
    }
}

/// Document converters, one per source format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Converters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiff: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postscript: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcl: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
}

impl Default for Converters {
    fn default() -> Self {
        Self {
            tiff: Some(PathBuf::from("bin/tiff2fax")),
            pdf: Some(PathBuf::from("bin/pdf2fax")),
            postscript: Some(PathBuf::from("bin/ps2fax")),
            pcl: Some(PathBuf::from("bin/pcl2fax")),
            data: None,
        }
    }
}

impl Converters {
    pub fn get(&self, kind: DocKind) -> Option<&Path> {
        match kind {
            DocKind::Tiff => self.tiff.as_deref(),
            DocKind::Pdf => self.pdf.as_deref(),
            DocKind::PostScript => self.postscript.as_deref(),
            DocKind::Pcl => self.pcl.as_deref(),
            DocKind::Data => self.data.as_deref(),
        }
    }
}

/// External commands the scheduler runs. Relative paths resolve against the
/// spool directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Commands {
    pub send_fax: PathBuf,
    pub send_page: PathBuf,
    pub send_uucp: PathBuf,
    /// Notification hook; unset disables notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<PathBuf>,
    /// Continuation cover page generator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<PathBuf>,
    pub converters: Converters,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            send_fax: PathBuf::from("bin/faxsend"),
            send_page: PathBuf::from("bin/pagesend"),
            send_uucp: PathBuf::from("bin/uucpsend"),
            notify: None,
            cover: None,
            converters: Converters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Simultaneous calls to one destination
    pub max_concurrent_calls: u32,
    /// Jobs folded into one call
    pub max_batch_jobs: u32,
    pub max_dials: u16,
    pub max_tries: u16,
    pub max_send_pages: u16,
    /// How often a busy device lock is retested
    #[serde(with = "humantime_serde")]
    pub lock_poll_interval: Duration,
    /// Directory holding UUCP-style device locks
    pub lock_dir: PathBuf,
    pub requeue: RequeueDelays,
    pub time_of_day: TimeOfDay,
    pub commands: Commands,
    pub dial: DialRules,
    /// Modem group name to device-name pattern
    pub modem_groups: BTreeMap<String, Pattern>,
    /// Modems known at startup, before any modem server reports in
    pub modems: Vec<String>,
    pub job_control: Vec<JobControlRule>,
    /// tracing filter directive for the daemon log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 1,
            max_batch_jobs: 64,
            max_dials: 12,
            max_tries: 3,
            max_send_pages: u16::MAX,
            lock_poll_interval: Duration::from_secs(30),
            lock_dir: PathBuf::from("/var/lock"),
            requeue: RequeueDelays::default(),
            time_of_day: TimeOfDay::any(),
            commands: Commands::default(),
            dial: DialRules::default(),
            modem_groups: BTreeMap::new(),
            modems: Vec::new(),
            job_control: Vec::new(),
            log_filter: None,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Limits and windows in force for one destination
    pub fn controls_for(&self, dest: &str) -> DestControls {
        DestControls::resolve(self, dest)
    }
}

/// Configuration file plus runtime overrides
#[derive(Debug)]
pub struct ConfigSource {
    path: PathBuf,
    modified: Option<SystemTime>,
    base: toml::Table,
    overrides: Vec<(String, toml::Value)>,
    current: Config,
}

impl ConfigSource {
    /// Load `path`; a missing file yields the defaults
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut source = Self {
            path,
            modified: None,
            base: toml::Table::new(),
            overrides: Vec::new(),
            current: Config::default(),
        };
        source.read()?;
        Ok(source)
    }

    /// A configuration with no backing file
    pub fn in_memory(config: Config) -> Self {
        let base = match toml::Value::try_from(&config) {
            Ok(toml::Value::Table(table)) => table,
            _ => toml::Table::new(),
        };
        Self {
            path: PathBuf::new(),
            modified: None,
            base,
            overrides: Vec::new(),
            current: config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file if its modification time changed. Returns whether a
    /// new configuration was installed. On a parse error the previous
    /// configuration stays in force.
    pub fn reload_if_changed(&mut self) -> Result<bool, ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Ok(false);
        }
        if mtime(&self.path) == self.modified {
            return Ok(false);
        }
        self.read()?;
        Ok(true)
    }

    /// Apply a runtime override. `key` may be dotted (`requeue.busy`); the
    /// value is read as a TOML literal, falling back to a plain string.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = literal(value);
        let mut table = self.effective_table();
        insert_dotted(&mut table, key, value.clone())?;
        let config = build(table).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.overrides.retain(|(k, _)| k != key);
        self.overrides.push((key.to_string(), value));
        self.current = config;
        tracing::info!(key, "configuration override applied");
        Ok(())
    }

    fn read(&mut self) -> Result<(), ConfigError> {
        let modified = mtime(&self.path);
        let base = match std::fs::read_to_string(&self.path) {
            Ok(content) => match toml::from_str::<toml::Table>(&content) {
                Ok(table) => table,
                Err(e) => {
                    // Do not retry the same broken file on every pass
                    self.modified = modified;
                    return Err(e.into());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let previous = std::mem::replace(&mut self.base, base);
        match build(self.effective_table()) {
            Ok(config) => {
                self.current = config;
                self.modified = modified;
                tracing::info!(path = %self.path.display(), "configuration loaded");
                Ok(())
            }
            Err(e) => {
                self.base = previous;
                self.modified = modified;
                Err(e)
            }
        }
    }

    fn effective_table(&self) -> toml::Table {
        let mut table = self.base.clone();
        for (key, value) in &self.overrides {
            // Overrides were validated when set
            let _ = insert_dotted(&mut table, key, value.clone());
        }
        table
    }
}

fn build(table: toml::Table) -> Result<Config, ConfigError> {
    Ok(toml::Value::Table(table).try_into()?)
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn literal(value: &str) -> toml::Value {
    match toml::from_str::<toml::Table>(&format!("v = {value}")) {
        Ok(mut t) => t.remove("v").unwrap_or_else(|| toml::Value::String(value.to_string())),
        Err(_) => toml::Value::String(value.to_string()),
    }
}

fn insert_dotted(table: &mut toml::Table, key: &str, value: toml::Value) -> Result<(), ConfigError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(last) = parts.pop() else {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "empty key".to_string(),
        });
    };
    let mut cursor = table;
    for part in parts {
        let entry = cursor
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        cursor = match entry {
            toml::Value::Table(t) => t,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{part} is not a table"),
                })
            }
        };
    }
    cursor.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
