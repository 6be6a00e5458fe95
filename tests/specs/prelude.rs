//! Shared helpers for behavioral specs.
//!
//! A [`Spool`] is a throwaway spool directory with a minimal config; specs
//! start `faxqd` on it and drive it with `faxctl`.

#![allow(dead_code, deprecated)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

/// Upper bound for anything a spec waits on
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

const SPEC_POLL_MS: u64 = 20;

/// Sender that logs its arguments and reports a successful transmission
pub const SENDER_OK: &str = "#!/bin/sh\necho \"$@\" >> sent.log\necho \"Sent OK\"\nexit 0\n";

/// Sender whose remote end refuses the document (exit status 2)
pub const SENDER_REJECTED: &str = "#!/bin/sh\necho \"Remote rejected document\"\nexit 2\n";

/// Poll `check` until it holds or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_MS));
    }
}

pub struct Spool {
    dir: TempDir,
}

impl Spool {
    /// Spool with one modem (ttyS0) and device locks kept inside the spool
    pub fn empty() -> Self {
        let spool = Self {
            dir: TempDir::new().unwrap(),
        };
        let locks = spool.path().join("locks");
        std::fs::create_dir_all(&locks).unwrap();
        spool.file(
            "etc/config.toml",
            &format!(
                "lock_dir = {:?}\nmodems = [\"ttyS0\"]\n",
                locks.display().to_string()
            ),
        );
        spool
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Write an executable shell script
    pub fn script(&self, rel: &str, body: &str) {
        self.file(rel, body);
        let path = self.path().join(rel);
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn read(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.path().join(rel)).ok()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path().join(rel).exists()
    }

    /// Queue a one-document fax record the way a submission server would
    pub fn queue_job(&self, id: &str, number: &str) {
        self.queue_record(id, &format!("jobid:{id}\nnumber:{number}\nfax:0::docq/fax{id}.tif\n"));
    }

    /// Queue a record with extra tag lines appended
    pub fn queue_record(&self, id: &str, text: &str) {
        self.file(&format!("docq/fax{id}.tif"), "II*\0");
        self.file(&format!("sendq/q{id}"), text);
    }

    pub fn faxctl(&self) -> CliBuilder {
        CliBuilder::new("faxctl").spool(self.path())
    }

    pub fn start_daemon(&self) -> Daemon {
        let child = Command::new(cargo_bin("faxqd"))
            .arg(self.path())
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let ready = wait_for(SPEC_WAIT_MAX_MS, || {
            self.exists("FIFO") && self.exists("faxqd.pid")
        });
        assert!(
            ready,
            "faxqd did not start; log:\n{}",
            self.read("log/faxqd.log").unwrap_or_default()
        );
        Daemon { child }
    }

    pub fn log(&self) -> String {
        self.read("log/faxqd.log").unwrap_or_default()
    }
}

/// A running faxqd, killed when dropped
pub struct Daemon {
    child: Child,
}

impl Daemon {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn signal(&self, signal: Signal) {
        kill(Pid::from_raw(self.child.id() as i32), signal).unwrap();
    }

    /// Wait for the daemon to exit on its own
    pub fn exited(&mut self) -> bool {
        wait_for(SPEC_WAIT_MAX_MS, || matches!(self.child.try_wait(), Ok(Some(_))))
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    fn new(bin: &str) -> Self {
        let mut cmd = Command::new(cargo_bin(bin));
        cmd.env_remove("FAXQ_SPOOL");
        Self { cmd }
    }

    fn spool(mut self, spool: &Path) -> Self {
        self.cmd.arg("--spool").arg(spool);
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            run.output.status.success(),
            "expected success, got {}\nstderr: {}",
            run.output.status,
            run.stderr()
        );
        run
    }

    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            !run.output.status.success(),
            "expected failure\nstdout: {}",
            run.stdout()
        );
        run
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout missing {expected:?}:\n{stdout}");
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr missing {expected:?}:\n{stderr}");
        self
    }
}

/// Path of a built workspace binary
pub fn bin(name: &str) -> PathBuf {
    cargo_bin(name)
}
