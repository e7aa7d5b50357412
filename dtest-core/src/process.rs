//! Daemon subprocess lifecycle.
//!
//! At most one daemon is tracked at a time. `stop` is idempotent and is also
//! run on drop, so a tracked daemon never outlives its controller.

use crate::config::StopPolicy;
use crate::error::{HarnessError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct ProcessController {
    binary: Utf8PathBuf,
    policy: StopPolicy,
    child: Option<Child>,
    started: bool,
    last_pid: Option<u32>,
}

impl ProcessController {
    pub fn new(binary: impl Into<Utf8PathBuf>, policy: StopPolicy) -> Self {
        Self {
            binary: binary.into(),
            policy,
            child: None,
            started: false,
            last_pid: None,
        }
    }

    /// Launch `<binary> --foreground --config <config_path>`.
    ///
    /// Standard error goes to `diagnostics`. Returns as soon as the process
    /// is spawned; readiness is for the caller to poll.
    pub fn start(&mut self, config_path: &Utf8Path, diagnostics: impl Into<Stdio>) -> Result<()> {
        if let Some(child) = &self.child {
            return Err(HarnessError::InvalidState(format!(
                "daemon already tracked (pid {})",
                child.id()
            )));
        }

        info!("Starting daemon {}", self.binary);
        let child = Command::new(self.binary.as_std_path())
            .arg("--foreground")
            .arg("--config")
            .arg(config_path.as_std_path())
            .stdin(Stdio::null())
            .stderr(diagnostics)
            .spawn()
            .map_err(|e| HarnessError::Process(format!("Failed to launch {}: {e}", self.binary)))?;

        debug!("Daemon pid {}", child.id());
        self.last_pid = Some(child.id());
        self.child = Some(child);
        self.started = true;
        Ok(())
    }

    /// Terminate the tracked daemon, if any, and wait for it to exit.
    pub fn stop(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        if child.try_wait()?.is_none() {
            info!("Stopping daemon");
            match kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                // Exited between the poll and the signal; reaped below.
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    return Err(HarnessError::Process(format!(
                        "Failed to signal daemon: {e}"
                    )));
                }
            }
            wait_for_exit(child, self.policy)?;
        }

        info!("Daemon has stopped");
        self.child = None;
        Ok(())
    }

    pub fn state(&mut self) -> DaemonState {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => DaemonState::Running,
                _ => DaemonState::Stopped,
            },
            None if self.started => DaemonState::Stopped,
            None => DaemonState::NotStarted,
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.state() == DaemonState::Running
    }

    /// Pid of the most recently started daemon, even after it has stopped.
    pub fn last_pid(&self) -> Option<u32> {
        self.last_pid
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }
}

fn wait_for_exit(child: &mut Child, policy: StopPolicy) -> Result<()> {
    match policy {
        StopPolicy::Wait => {
            child.wait()?;
        }
        StopPolicy::Escalate(grace) => {
            let deadline = Instant::now() + grace;
            while child.try_wait()?.is_none() {
                if Instant::now() >= deadline {
                    warn!("Daemon ignored SIGTERM for {:?}, killing it", grace);
                    child.kill()?;
                    child.wait()?;
                    break;
                }
                std::thread::sleep(EXIT_POLL_INTERVAL);
            }
        }
    }
    Ok(())
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop daemon on drop: {}", e);
        }
    }
}
