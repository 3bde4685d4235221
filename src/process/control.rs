//! Platform-specific process termination.

use std::time::Duration;

use crate::error::{AppError, Result};

#[cfg(unix)]
use super::EXIT_POLL_INTERVAL;

/// Check if a process is alive by PID.
#[cfg(unix)]
pub(super) fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Send a signal to the process group led by `pid`, falling back to the process itself.
#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::{getpgid, Pid};

    let target = Pid::from_raw(pid as i32);
    match getpgid(Some(target)) {
        Ok(pgid) => killpg(pgid, signal).map_err(|e| {
            AppError::process(format!(
                "Failed to send {} to process group {} (from pid {}): {}",
                signal,
                pgid.as_raw(),
                pid,
                e
            ))
        }),
        Err(e) => kill(target, signal).map_err(|kill_err| {
            AppError::process(format!(
                "Failed to send {} to pid {} (getpgid failed: {}): {}",
                signal, pid, e, kill_err
            ))
        }),
    }
}

#[cfg(unix)]
pub(super) fn force_kill(pid: u32) -> Result<()> {
    signal_group(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(not(unix))]
pub(super) fn force_kill(pid: u32) -> Result<()> {
    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output()
        .map_err(|e| AppError::process(format!("Failed to run taskkill: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::process(format!(
            "taskkill failed for pid {}: {}",
            pid,
            stderr.trim()
        )))
    }
}

/// Ask a process to exit, then kill it if it is still alive after `timeout`.
#[cfg(unix)]
pub(super) async fn terminate(pid: u32, timeout: Duration) -> Result<()> {
    if !is_process_alive(pid) {
        return Ok(());
    }

    if let Err(e) = signal_group(pid, nix::sys::signal::Signal::SIGTERM) {
        log::warn!("Graceful signal failed for PID {pid}: {e}, force killing");
        return force_kill(pid);
    }

    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if !is_process_alive(pid) {
            return Ok(());
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }

    log::warn!(
        "PID {pid} did not exit within {}s, force killing",
        timeout.as_secs()
    );
    force_kill(pid)
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
pub(super) async fn terminate(pid: u32, _timeout: Duration) -> Result<()> {
    force_kill(pid)
}
