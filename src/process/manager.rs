//! Process tracking, telemetry and the [`ProcessSupervisor`] implementation.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::process::Command;

use super::control::terminate;
use super::{ManagedProcess, ProcessStatus};
use crate::error::{AppError, Result};
use crate::supervisor::{Monit, ProcessRecord, ProcessSupervisor, StartRequest};

type ProcessTable = Arc<RwLock<HashMap<String, ManagedProcess>>>;

/// Launches app processes as children of this process and keeps track of them.
pub struct ProcessManager {
    processes: ProcessTable,
    start_command: Vec<String>,
    stop_timeout: Duration,
    system: Mutex<System>,
}

impl ProcessManager {
    /// `start_command` is the program and leading arguments; per-process
    /// arguments from [`StartRequest::args`] are appended.
    pub fn new(start_command: Vec<String>, stop_timeout: Duration) -> Self {
        Self {
            processes: Arc::new(RwLock::new(HashMap::new())),
            start_command,
            stop_timeout,
            system: Mutex::new(System::new()),
        }
    }

    fn get(&self, name: &str) -> Option<ManagedProcess> {
        let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
        procs.get(name).cloned()
    }

    fn set_status(&self, name: &str, pid: u32, status: ProcessStatus) {
        set_status_if_current(&self.processes, name, pid, status);
    }

    /// Read memory and CPU usage for the given PIDs.
    fn sample(&self, pids: &[u32]) -> HashMap<u32, Monit> {
        if pids.is_empty() {
            return HashMap::new();
        }
        let targets: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();

        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&targets),
            true,
            ProcessRefreshKind::everything(),
        );

        pids.iter()
            .filter_map(|pid| {
                let process = system.process(Pid::from_u32(*pid))?;
                Some((
                    *pid,
                    Monit {
                        memory: process.memory(),
                        cpu: process.cpu_usage(),
                    },
                ))
            })
            .collect()
    }

    async fn stop_entry(&self, name: &str, info: &ManagedProcess) -> Result<()> {
        if !info.is_running() {
            return Ok(());
        }

        self.set_status(name, info.pid, ProcessStatus::Stopping);
        log::info!("Stopping process {} (pid: {})", name, info.pid);
        let result = terminate(info.pid, self.stop_timeout).await;
        self.set_status(name, info.pid, ProcessStatus::Stopped);
        result
    }

    /// Stop every running process. Used on shutdown.
    pub async fn stop_all(&self) {
        let entries: Vec<(String, ManagedProcess)> = {
            let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
            procs
                .iter()
                .filter(|(_, info)| info.is_running())
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect()
        };

        let stops = entries.iter().map(|(name, info)| async move {
            if let Err(e) = self.stop_entry(name, info).await {
                log::error!("Failed to stop process {}: {}", name, e);
            }
        });
        join_all(stops).await;
    }
}

/// Update an entry only if it still tracks `pid`; a restart may have replaced it.
fn set_status_if_current(processes: &ProcessTable, name: &str, pid: u32, status: ProcessStatus) {
    let mut procs = processes.write().unwrap_or_else(|e| e.into_inner());
    if let Some(info) = procs.get_mut(name) {
        if info.pid == pid {
            info.status = status;
        }
    }
}

#[async_trait]
impl ProcessSupervisor for ProcessManager {
    async fn connect(&self) -> Result<()> {
        let Some(program) = self.start_command.first() else {
            return Err(AppError::supervisor_unavailable(
                "Supervisor start_command must not be empty",
            ));
        };
        log::info!("Process supervisor ready (start command: {})", program);
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let mut entries: Vec<(String, ManagedProcess)> = {
            let procs = self.processes.read().unwrap_or_else(|e| e.into_inner());
            procs
                .iter()
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect()
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let running: Vec<u32> = entries
            .iter()
            .filter(|(_, info)| info.is_running())
            .map(|(_, info)| info.pid)
            .collect();
        let usage = self.sample(&running);

        Ok(entries
            .into_iter()
            .map(|(name, info)| {
                let running = info.is_running();
                ProcessRecord {
                    name,
                    pid: running.then_some(info.pid),
                    status: info.status.as_str().to_string(),
                    monit: if running {
                        usage.get(&info.pid).copied().unwrap_or_default()
                    } else {
                        Monit::default()
                    },
                }
            })
            .collect())
    }

    async fn start_process(&self, request: StartRequest) -> Result<()> {
        let (program, base_args) = self
            .start_command
            .split_first()
            .ok_or_else(|| AppError::config("Supervisor start_command must not be empty"))?;

        if let Some(existing) = self.get(&request.name) {
            self.stop_entry(&request.name, &existing).await?;
        }

        let mut cmd = Command::new(program);
        cmd.args(base_args)
            .args(&request.args)
            .envs(request.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            AppError::process(format!(
                "Failed to start process {} in {:?}: {}",
                request.name, request.cwd, e
            ))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| AppError::process("Failed to get process ID"))?;

        {
            let mut procs = self.processes.write().unwrap_or_else(|e| e.into_inner());
            procs.insert(request.name.clone(), ManagedProcess::online(pid));
        }
        log::info!("Process {} started (pid: {})", request.name, pid);

        if let Some(stdout) = child.stdout.take() {
            let name = request.name.clone();
            let mut lines = BufReader::new(stdout).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    log::info!("[{} stdout] {}", name, line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let name = request.name.clone();
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    log::warn!("[{} stderr] {}", name, line);
                }
            });
        }

        let processes = Arc::clone(&self.processes);
        let name = request.name;
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(exit) if exit.success() => ProcessStatus::Stopped,
                Ok(exit) => {
                    log::warn!("Process {} exited with {}", name, exit);
                    ProcessStatus::Errored
                }
                Err(e) => {
                    log::error!("Failed to wait for process {}: {}", name, e);
                    ProcessStatus::Errored
                }
            };
            let mut procs = processes.write().unwrap_or_else(|e| e.into_inner());
            if let Some(info) = procs.get_mut(&name) {
                // A requested stop is recorded as `stopped` whatever the exit code.
                if info.pid == pid && info.status == ProcessStatus::Online {
                    info.status = status;
                }
            }
        });

        Ok(())
    }

    async fn stop_process(&self, name: &str) -> Result<()> {
        let info = self
            .get(name)
            .ok_or_else(|| AppError::process(format!("Process '{}' is not supervised", name)))?;
        self.stop_entry(name, &info).await
    }
}
