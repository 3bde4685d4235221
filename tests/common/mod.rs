#![allow(dead_code)]

use std::io::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_sync::app::App;
use app_sync::config::AppOptions;
use app_sync::repository::{RemoteFiles, Repository, RepositoryResolver};
use app_sync::supervisor::{Monit, ProcessRecord, ProcessSupervisor, StartRequest};
use app_sync::{AppError, Result};
use tokio::sync::Semaphore;

/// Build a GitHub-style tarball: every path is nested under a `<repo>-<sha>/` root.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("acme-widgets-0123456/{}", path), body.as_bytes())
            .unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// In-memory repository with a settable head commit.
pub struct FakeRepo {
    name: String,
    full_name: String,
    head: Mutex<String>,
    files: Vec<(String, String)>,
    fail_head: bool,
    get_calls: AtomicUsize,
    requested: Mutex<Vec<(String, String)>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeRepo {
    pub fn new(head: &str, files: &[(&str, &str)]) -> Self {
        Self {
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            head: Mutex::new(head.to_string()),
            files: files
                .iter()
                .map(|(path, body)| (path.to_string(), body.to_string()))
                .collect(),
            fail_head: false,
            get_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Head inquiries fail, as when GitHub is unreachable.
    pub fn unreachable() -> Self {
        Self {
            fail_head: true,
            ..Self::new("abc", &[])
        }
    }

    /// `get` waits for a permit on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_head(&self, head: &str) {
        *self.head.lock().unwrap() = head.to_string();
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// `(sub_path, git_ref)` of every `get` call.
    pub fn requested(&self) -> Vec<(String, String)> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Repository for FakeRepo {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    async fn head(&self, _branch: &str) -> Result<String> {
        if self.fail_head {
            return Err(AppError::github("HTTP 503: unavailable"));
        }
        Ok(self.head.lock().unwrap().clone())
    }

    async fn get(&self, sub_path: &str, git_ref: &str) -> Result<RemoteFiles> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push((sub_path.to_string(), git_ref.to_string()));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let files: Vec<(&str, &str)> = self
            .files
            .iter()
            .map(|(path, body)| (path.as_str(), body.as_str()))
            .collect();
        RemoteFiles::from_tarball(git_ref, sub_path, tarball(&files))
    }
}

/// Resolver handing out one shared [`FakeRepo`] and recording what it was asked for.
pub struct FakeResolver {
    pub repo: Arc<FakeRepo>,
    pub resolved: Mutex<Vec<(String, String, Option<String>)>>,
}

impl FakeResolver {
    pub fn new(repo: Arc<FakeRepo>) -> Self {
        Self {
            repo,
            resolved: Mutex::new(Vec::new()),
        }
    }
}

impl RepositoryResolver for FakeResolver {
    fn resolve(
        &self,
        user_agent: &str,
        full_name: &str,
        token: Option<&str>,
    ) -> Result<Arc<dyn Repository>> {
        self.resolved.lock().unwrap().push((
            user_agent.to_string(),
            full_name.to_string(),
            token.map(str::to_string),
        ));
        let repo: Arc<dyn Repository> = self.repo.clone();
        Ok(repo)
    }
}

/// Supervisor that reports a fixed process list and records requests.
#[derive(Default)]
pub struct FakeSupervisor {
    processes: Mutex<Vec<ProcessRecord>>,
    pub started: Mutex<Vec<StartRequest>>,
    pub stopped: Mutex<Vec<String>>,
    broken: bool,
}

impl FakeSupervisor {
    pub fn with_processes(processes: Vec<ProcessRecord>) -> Self {
        Self {
            processes: Mutex::new(processes),
            ..Self::default()
        }
    }

    /// Every call fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn started_names(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.name.clone())
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.broken {
            Err(AppError::supervisor_unavailable("not connected"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ProcessSupervisor for FakeSupervisor {
    async fn connect(&self) -> Result<()> {
        self.check()
    }

    async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        self.check()?;
        Ok(self.processes.lock().unwrap().clone())
    }

    async fn start_process(&self, request: StartRequest) -> Result<()> {
        self.check()?;
        self.started.lock().unwrap().push(request);
        Ok(())
    }

    async fn stop_process(&self, name: &str) -> Result<()> {
        self.check()?;
        self.stopped.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

pub fn process(name: &str, status: &str, memory: u64, cpu: f32) -> ProcessRecord {
    ProcessRecord {
        name: name.to_string(),
        pid: Some(4242),
        status: status.to_string(),
        monit: Monit { memory, cpu },
    }
}

/// Options for an app stored under `target`, with no install step.
pub fn options(id: &str, repo: &str, route: &str, target: &Path) -> AppOptions {
    let mut options = AppOptions::new(id, repo, route, "app-sync-tests");
    options.target_folder = target.to_path_buf();
    options.install_command = Vec::new();
    options
}

pub fn build_app(
    options: AppOptions,
    repo: &Arc<FakeRepo>,
    supervisor: &Arc<FakeSupervisor>,
) -> Arc<App> {
    let resolver = FakeResolver::new(Arc::clone(repo));
    let supervisor: Arc<dyn ProcessSupervisor> = supervisor.clone();
    Arc::new(App::new(options, &resolver, supervisor).unwrap())
}

/// Wait until no update is running for `app`.
pub async fn wait_for_update(app: &App) {
    for _ in 0..200 {
        if !app.is_downloading() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("update of {} did not finish", app.id());
}
