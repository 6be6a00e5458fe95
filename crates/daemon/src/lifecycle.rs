// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::io::Write;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use fq_adapters::{
    PipeFifoAdapter, ScriptNotifyAdapter, TokioProcessAdapter, TracedLockAdapter, TracedProcessAdapter,
    UucpLockAdapter,
};
use fq_core::{ConfigError, ConfigSource, SystemClock};
use fq_engine::{EngineError, QueueDeps, QueueManager};
use fq_storage::{Spool, StorageError};
use nix::sys::stat::Mode;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::unix::pipe;
use tracing::{info, warn};

/// Queue manager with the production adapters (wrapped with tracing)
pub type DaemonQueue = QueueManager<
    TracedProcessAdapter<TokioProcessAdapter>,
    TracedLockAdapter<UucpLockAdapter>,
    ScriptNotifyAdapter,
    PipeFifoAdapter,
    SystemClock,
>;

/// Lines arriving on the scheduler FIFO
pub type CommandLines = Lines<BufReader<pipe::Receiver>>;

/// Longest the loop sleeps when nothing is scheduled
const IDLE_WAKEUP: Duration = Duration::from_secs(60);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub spool: Spool,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to the command FIFO
    pub fifo_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Create config for a spool directory
    pub fn for_spool(root: &Path) -> Result<Self, LifecycleError> {
        let canonical = root
            .canonicalize()
            .map_err(|e| LifecycleError::SpoolNotFound(root.to_path_buf(), e))?;
        let spool = Spool::new(canonical);
        Ok(Self {
            lock_path: spool.pid_file(),
            fifo_path: spool.fifo(),
            log_path: spool.log_dir().join("faxqd.log"),
            spool,
        })
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub commands: CommandLines,
    pub queue: DaemonQueue,
    /// Writer for command acknowledgements
    pub replies: PipeFifoAdapter,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// How long the loop may sleep before the queue needs a tick
    pub fn next_tick_in(&mut self) -> Duration {
        wakeup_delay(self.queue.next_wakeup(), Utc::now())
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "shutting down daemon");

        // 1. Remove the FIFO so new clients fail instead of blocking
        if self.config.fifo_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.fifo_path) {
                warn!("Failed to remove FIFO: {}", e);
            }
        }

        // 2. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 3. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Time until `wakeup`, capped when nothing is due
pub fn wakeup_delay(wakeup: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    match wakeup {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO).min(IDLE_WAKEUP),
        None => IDLE_WAKEUP,
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Spool not found at {0}: {1}")]
    SpoolNotFound(PathBuf, std::io::Error),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("{0} exists and is not a FIFO")]
    NotAFifo(PathBuf),

    #[error("Failed to create FIFO at {0}: {1}")]
    Fifo(PathBuf, nix::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Recovery error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config, &e);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create spool directories
    config.spool.ensure_dirs()?;

    // 2. Acquire lock file FIRST - prevents two schedulers on one spool
    let mut lock_file = File::create(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Load configuration
    let settings = ConfigSource::load(config.spool.config_path())?;
    info!(
        modems = settings.config().modems.len(),
        max_concurrent_calls = settings.config().max_concurrent_calls,
        "configuration ready"
    );

    // 4. Open the command FIFO. Holding it read-write keeps a writer open,
    //    so the reader never sees end-of-file between clients.
    ensure_fifo(&config.fifo_path)?;
    let receiver = pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(&config.fifo_path)?;
    let commands = BufReader::new(receiver).lines();

    // 5. Set up adapters (wrapped with tracing for observability)
    let root = config.spool.root().to_path_buf();
    let deps = QueueDeps {
        procs: TracedProcessAdapter::new(TokioProcessAdapter::new()),
        locks: TracedLockAdapter::new(UucpLockAdapter::new(settings.config().lock_dir.clone())),
        notify: ScriptNotifyAdapter::new(&root),
        fifo: PipeFifoAdapter::default(),
    };
    let mut queue = QueueManager::new(config.spool.clone(), settings, deps, SystemClock);

    // 6. Pick up the jobs an earlier run left behind
    let recovered = queue.recover().await?;

    info!(spool = %root.display(), recovered, "Daemon started");

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        commands,
        queue,
        replies: PipeFifoAdapter::default(),
        start_time: Instant::now(),
    })
}

/// Create the command FIFO unless it already exists
fn ensure_fifo(path: &Path) -> Result<(), LifecycleError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(()),
        Ok(_) => Err(LifecycleError::NotAFifo(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o622))
                .map_err(|e| LifecycleError::Fifo(path.to_path_buf(), e))
        }
        Err(e) => Err(e.into()),
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config, error: &LifecycleError) {
    // Another daemon owns the spool; leave its files alone
    if matches!(error, LifecycleError::LockFailed(_)) {
        return;
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
