//! In-process supervisor for app processes.

mod control;
mod manager;

use std::time::Duration;

pub use manager::ProcessManager;

/// Time a process gets to exit after SIGTERM before it is killed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for a process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessStatus {
    Online,
    Stopping,
    Stopped,
    Errored,
}

impl ProcessStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        }
    }
}

/// Tracking entry of a launched process.
#[derive(Debug, Clone)]
pub(crate) struct ManagedProcess {
    pub pid: u32,
    pub status: ProcessStatus,
}

impl ManagedProcess {
    pub(crate) fn online(pid: u32) -> Self {
        Self {
            pid,
            status: ProcessStatus::Online,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.status, ProcessStatus::Online | ProcessStatus::Stopping)
    }
}
