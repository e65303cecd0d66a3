//! Child process spawner and exit monitor.
//!
//! The child is started once with:
//! - stdin and stdout piped, owned exclusively by the bridge;
//! - stderr inherited, so its diagnostics land on the host's stderr unparsed;
//! - `kill_on_drop(true)`, so the child never outlives the bridge;
//! - optionally `env_clear()` plus an allowlist of host variables.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ShimConfig;
use crate::shim::lifecycle::{Fatal, Lifecycle, Termination};
use crate::{AppError, Result};

/// A freshly spawned child and its piped stdio.
#[derive(Debug)]
pub struct ChildProcess {
    /// Child handle, kept alive so `kill_on_drop` applies.
    pub child: Child,
    /// Write end of the child's stdin.
    pub stdin: ChildStdin,
    /// Read end of the child's stdout.
    pub stdout: ChildStdout,
    /// OS process id, if the platform reports one.
    pub pid: Option<u32>,
}

/// Build the command described by `config`.
#[must_use]
pub fn build_command(config: &ShimConfig) -> Command {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    if let Some(allowlist) = &config.env_allowlist {
        cmd.env_clear();
        for key in allowlist {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
    }

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    cmd
}

/// Spawn the child described by `config`.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn …")`: OS spawn failure.
/// - `AppError::Spawn("failed to capture …")`: stdio pipe unavailable.
pub fn spawn_child(config: &ShimConfig) -> Result<ChildProcess> {
    let mut child = build_command(config).spawn().map_err(|err| {
        AppError::Spawn(format!("failed to spawn `{}`: {err}", config.command))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stdout".into()))?;
    let pid = child.id();

    info!(command = %config.command, args = ?config.args, pid, "child process spawned");

    Ok(ChildProcess {
        child,
        stdin,
        stdout,
        pid,
    })
}

/// Await child exit and report it as fatal, or stop the child on cancellation.
///
/// Any exit observed while the bridge is running moves `lifecycle` to
/// `Terminated(Fatal(ChildExited))`. On cancellation the child is sent
/// SIGTERM (unix), given `grace` to exit, then killed.
pub async fn monitor_exit(
    mut child: Child,
    lifecycle: Arc<Lifecycle>,
    cancel: CancellationToken,
    grace: Duration,
) {
    tokio::select! {
        result = child.wait() => {
            let fatal = match result {
                Ok(status) => Fatal::ChildExited { code: status.code() },
                Err(err) => Fatal::StreamError(format!("wait error: {err}")),
            };
            if lifecycle.terminate(Termination::Fatal(fatal.clone())) {
                error!(error = %fatal, "exit: child process ended");
            }
        }
        () = cancel.cancelled() => {
            stop_child(&mut child, grace).await;
        }
    }
}

/// Ask the child to stop, escalating to a kill after `grace`.
async fn stop_child(child: &mut Child, grace: Duration) {
    request_terminate(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(code = status.code(), "child stopped"),
        Ok(Err(err)) => warn!(%err, "error waiting for child during shutdown"),
        Err(_elapsed) => {
            warn!(?grace, "child ignored termination request, killing");
            child.kill().await.ok();
        }
    }
}

#[cfg(unix)]
fn request_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, %err, "failed to send SIGTERM to child");
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    // No polite signal available; start_kill is immediate.
    child.start_kill().ok();
}
