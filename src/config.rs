use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::github::DEFAULT_API_BASE;
use crate::paths::DEFAULT_TARGET_FOLDER;
use crate::process::DEFAULT_STOP_TIMEOUT;

/// Port an app listens on when none is configured.
pub const DEFAULT_APP_PORT: u16 = 5000;

/// Branch fetched when none is configured.
pub const DEFAULT_BRANCH: &str = "master";

/// Environment variable that overrides `[github].token`.
pub const TOKEN_ENV: &str = "APP_SYNC_GITHUB_TOKEN";

pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Failed to read config {:?}: {}", path, e)))?;
    let mut config: SyncConfig = toml::from_str(&content)?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            config.github.token = Some(token);
        }
    }
    config.validate()?;
    Ok(config)
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Route the status endpoints are served under, e.g. `*/status`.
    pub base_route: String,
    #[serde(default = "default_target_folder")]
    pub target_folder: PathBuf,
    /// Seconds between background status checks; `0` disables them.
    #[serde(default)]
    pub check_interval_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            token: None,
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Program and leading arguments used to launch an app.
    #[serde(default = "default_start_command")]
    pub start_command: Vec<String>,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            start_command: default_start_command(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

/// One `[[apps]]` entry. Unset fields fall back to the top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub target_folder: Option<PathBuf>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub install_command: Option<Vec<String>>,
}

/// Fully specified settings of one app, as consumed by [`crate::app::App::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOptions {
    pub id: String,
    /// `user/repo[/sub/path]`.
    pub repo: String,
    pub route: String,
    /// Client identification sent to the repository host.
    pub user_agent: String,
    pub token: Option<String>,
    pub port: u16,
    pub branch: String,
    pub target_folder: PathBuf,
    /// Dependency install argv; empty skips the install step.
    pub install_command: Vec<String>,
}

impl AppOptions {
    /// Options with every optional setting at its default.
    pub fn new(
        id: impl Into<String>,
        repo: impl Into<String>,
        route: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            repo: repo.into(),
            route: route.into(),
            user_agent: user_agent.into(),
            token: None,
            port: DEFAULT_APP_PORT,
            branch: DEFAULT_BRANCH.to_string(),
            target_folder: default_target_folder(),
            install_command: default_install_command(),
        }
    }

    /// Check the mandatory fields. Repo and route syntax are checked by the app itself.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::config("'id' for the app is required"));
        }
        if self.id.contains([':', '/', '\\']) || self.id.trim() != self.id {
            return Err(AppError::config(format!(
                "App id '{}' must not contain ':', slashes or surrounding whitespace",
                self.id
            )));
        }
        if self.repo.trim().is_empty() {
            return Err(AppError::config(format!(
                "'repo' name required for the '{}' app, eg. 'username/my-repo'",
                self.id
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::config(
                "The GitHub API user-agent must be specified. See: https://developer.github.com/v3/#user-agent-required",
            ));
        }
        if self.route.trim().is_empty() {
            return Err(AppError::config(format!(
                "A 'route' must be specified for the '{}' app.",
                self.id
            )));
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        crate::route::Route::parse(&self.base_route)?;
        self.listen
            .parse::<std::net::SocketAddr>()
            .map_err(|e| AppError::config(format!("Invalid listen address '{}': {}", self.listen, e)))?;

        let mut seen = HashSet::new();
        for app in &self.apps {
            if !seen.insert(app.id.as_str()) {
                return Err(AppError::config(format!("Duplicate app id '{}'", app.id)));
            }
        }
        for options in self.app_options() {
            options.validate()?;
        }
        Ok(())
    }

    /// Merge each `[[apps]]` entry with the top-level defaults.
    pub fn app_options(&self) -> Vec<AppOptions> {
        self.apps
            .iter()
            .map(|app| AppOptions {
                id: app.id.clone(),
                repo: app.repo.clone(),
                route: app.route.clone(),
                user_agent: app
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| self.github.user_agent.clone()),
                token: app.token.clone().or_else(|| self.github.token.clone()),
                port: app.port.unwrap_or(DEFAULT_APP_PORT),
                branch: app
                    .branch
                    .clone()
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
                target_folder: app
                    .target_folder
                    .clone()
                    .unwrap_or_else(|| self.target_folder.clone()),
                install_command: app
                    .install_command
                    .clone()
                    .unwrap_or_else(default_install_command),
            })
            .collect()
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_target_folder() -> PathBuf {
    PathBuf::from(DEFAULT_TARGET_FOLDER)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_start_command() -> Vec<String> {
    vec!["node".to_string(), ".".to_string()]
}

fn default_stop_timeout_secs() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_secs()
}

pub fn default_install_command() -> Vec<String> {
    ["npm", "install", "--loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
