//! App management: the synchronized unit of code, its folder and its process.
//!
//! Each app lives in `<target_folder>/<id>`:
//! - the repository sub-path is extracted there at the branch head commit
//! - `.app-sync.toml` records which commit is installed
//! - the supervisor runs it as a process named after the app id

mod deploy;
mod lifecycle;
mod types;
mod version;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppOptions;
use crate::error::Result;
use crate::paths::app_folder;
use crate::repository::{RepoRef, Repository, RepositoryResolver};
use crate::route::Route;
use crate::supervisor::ProcessSupervisor;

pub use types::{DownloadOptions, DownloadResult, InstallMarker, UpdateOptions, VersionInfo};
pub use version::{read_install_marker, write_install_marker};
pub(crate) use deploy::short_commit;

pub struct App {
    id: String,
    repo: Arc<dyn Repository>,
    sub_path: String,
    branch: String,
    route: Route,
    port: u16,
    local_folder: PathBuf,
    install_command: Vec<String>,
    supervisor: Arc<dyn ProcessSupervisor>,
    /// Serializes saving, install, start and stop of this app.
    lifecycle: Mutex<()>,
    downloading: Arc<AtomicBool>,
}

impl App {
    pub fn new(
        options: AppOptions,
        resolver: &dyn RepositoryResolver,
        supervisor: Arc<dyn ProcessSupervisor>,
    ) -> Result<Self> {
        options.validate()?;
        let repo_ref = RepoRef::parse(&options.repo)?;
        let route = Route::parse(&options.route)?;
        let local_folder = app_folder(&options.target_folder, &options.id)?;
        let repo = resolver.resolve(
            &options.user_agent,
            &repo_ref.full_name(),
            options.token.as_deref(),
        )?;

        log::debug!(
            "App {} -> {} ({}) in {:?}",
            options.id,
            repo_ref,
            options.branch,
            local_folder
        );

        Ok(Self {
            id: options.id,
            repo,
            sub_path: repo_ref.sub_path,
            branch: options.branch,
            route,
            port: options.port,
            local_folder,
            install_command: options.install_command,
            supervisor,
            lifecycle: Mutex::new(()),
            downloading: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Absolute folder the app is installed into.
    pub fn local_folder(&self) -> &Path {
        &self.local_folder
    }

    /// Repository name without the owner.
    pub fn repo_name(&self) -> &str {
        self.repo.name()
    }

    pub fn repo_full_name(&self) -> &str {
        self.repo.full_name()
    }

    /// Sub-directory of the repository that is fetched, `""` for all of it.
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::Acquire)
    }

    /// Whether the install marker exists, i.e. the app was deployed at least once.
    pub fn is_deployed(&self) -> bool {
        crate::paths::install_marker_path(&self.local_folder).is_file()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("repo", &self.repo.full_name())
            .field("sub_path", &self.sub_path)
            .field("branch", &self.branch)
            .field("route", &self.route)
            .field("port", &self.port)
            .field("local_folder", &self.local_folder)
            .finish()
    }
}
