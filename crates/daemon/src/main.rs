// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fax queue daemon (faxqd)
//!
//! Background process that owns the spool, reads the command FIFO and
//! schedules outbound jobs onto modems.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use fq_core::ConfigSource;
use fq_daemon::lifecycle::{self, Config, LifecycleError};
use fq_daemon::server;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

/// Spool used when none is given on the command line
const DEFAULT_SPOOL: &str = "/var/spool/fax";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let spool_root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SPOOL));

    let config = Config::for_spool(&spool_root)?;

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting faxqd for spool: {}", config.spool.root().display());

    // Start daemon
    let mut daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, reading {}", config.fifo_path.display());

    // Main event loop
    loop {
        let delay = daemon.next_tick_in();
        tokio::select! {
            // Commands from clients
            line = daemon.commands.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Err(e) = server::handle_line(&mut daemon.queue, &daemon.replies, &line).await {
                            error!("Error handling command: {}", e);
                        }
                    }
                    Ok(None) => {
                        error!("Command FIFO closed");
                        daemon.shutdown().await?;
                        break;
                    }
                    Err(e) => error!("Error reading command FIFO: {}", e),
                }
            }

            // Finished converters and senders
            Some(completion) = daemon.queue.next_completion() => {
                daemon.queue.handle_completion(completion).await;
            }

            // Timers and scheduled passes
            _ = tokio::time::sleep(delay) => {
                daemon.queue.tick().await;
            }

            // Graceful shutdown on SIGTERM
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                daemon.shutdown().await?;
                break;
            }

            // Graceful shutdown on SIGINT
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                daemon.shutdown().await?;
                break;
            }
        }

        // Quit command accepted and every batch drained
        if daemon.queue.is_stopped() {
            info!("Shutdown requested via FIFO, shutting down...");
            daemon.shutdown().await?;
            break;
        }
    }

    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- faxqd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- faxqd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    // Create log directory if needed
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Append marker to log file with PID
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config.spool.log_dir();
    std::fs::create_dir_all(&dir)?;

    // Set up file appender
    let file_appender = tracing_appender::rolling::never(&dir, "faxqd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured filter
    let configured = ConfigSource::load(config.spool.config_path())
        .ok()
        .and_then(|source| source.config().log_filter.clone());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
