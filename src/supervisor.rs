//! Process supervisor contract and connection state.

use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Resource usage of a supervised process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Monit {
    /// Resident memory in bytes.
    pub memory: u64,
    /// CPU usage in percent.
    pub cpu: f32,
}

/// One supervised process as reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub name: String,
    pub pid: Option<u32>,
    /// `online`, `stopping`, `stopped` or `errored`.
    pub status: String,
    pub monit: Monit,
}

/// Request to launch a named process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub name: String,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    pub envs: Vec<(String, String)>,
}

#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Establish the link to the supervisor.
    async fn connect(&self) -> Result<()>;

    /// List all supervised processes.
    async fn list_processes(&self) -> Result<Vec<ProcessRecord>>;

    async fn start_process(&self, request: StartRequest) -> Result<()>;

    async fn stop_process(&self, name: &str) -> Result<()>;
}

/// Derive the owning app id from a supervised process name.
///
/// Process names follow `<appId>[:<suffix>]`, where the suffix is typically an
/// instance index added by the supervisor.
pub fn owner_app_id(process_name: &str) -> &str {
    process_name
        .split_once(':')
        .map_or(process_name, |(id, _)| id)
}

/// One-way readiness of the supervisor connection: uninitialized until
/// [`SupervisorLink::mark_ready`] is called, ready forever afterwards.
#[derive(Debug, Default)]
pub struct SupervisorLink {
    ready_since: OnceLock<DateTime<Utc>>,
}

impl SupervisorLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the supervisor is connected. Later calls keep the first timestamp.
    pub fn mark_ready(&self) {
        if self.ready_since.set(Utc::now()).is_ok() {
            if let Some(since) = self.ready_since.get() {
                log::info!("Supervisor connected at {}", since.to_rfc3339());
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_since.get().is_some()
    }
}
