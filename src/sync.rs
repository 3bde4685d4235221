//! Wires configuration, apps, supervisor and gateway into a running service.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::app::{DownloadOptions, DownloadResult, VersionInfo};
use crate::config::SyncConfig;
use crate::error::{AppError, Result};
use crate::gateway::{router, GatewayApi};
use crate::github::GitHubResolver;
use crate::process::ProcessManager;
use crate::registry::AppRegistry;
use crate::route::Route;
use crate::status::StatusAggregator;
use crate::supervisor::{ProcessSupervisor, SupervisorLink};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Version report of one app, printed by the `status` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppReport {
    pub id: String,
    pub route: String,
    pub repository: String,
    pub local_folder: String,
    pub version: VersionInfo,
}

pub struct SyncService {
    config: SyncConfig,
    base_route: Route,
    processes: Arc<ProcessManager>,
    registry: Arc<AppRegistry>,
    aggregator: Arc<StatusAggregator>,
    link: Arc<SupervisorLink>,
}

impl SyncService {
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        let base_route = Route::parse(&config.base_route)?;
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;
        let resolver = GitHubResolver::new(client, config.github.api_base.clone());

        let processes = Arc::new(ProcessManager::new(
            config.supervisor.start_command.clone(),
            Duration::from_secs(config.supervisor.stop_timeout_secs),
        ));
        let supervisor: Arc<dyn ProcessSupervisor> = Arc::clone(&processes) as _;

        let registry = Arc::new(AppRegistry::build(
            config.app_options(),
            &resolver,
            Arc::clone(&supervisor),
        )?);
        let aggregator = Arc::new(StatusAggregator::new(Arc::clone(&registry), supervisor));
        log::info!("Loaded {} apps", registry.len());

        Ok(Self {
            config,
            base_route,
            processes,
            registry,
            aggregator,
            link: Arc::new(SupervisorLink::new()),
        })
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Check local against remote versions of one app, or all of them.
    pub async fn report(&self, id: Option<&str>) -> Result<Vec<AppReport>> {
        let apps: Vec<_> = match id {
            Some(id) => vec![Arc::clone(
                self.registry
                    .get(id)
                    .ok_or_else(|| AppError::app_not_found(id))?,
            )],
            None => self.registry.iter().cloned().collect(),
        };

        let mut reports = Vec::with_capacity(apps.len());
        for app in apps {
            reports.push(AppReport {
                id: app.id().to_string(),
                route: format!("{} ⇨ {}", app.route(), app.port()),
                repository: format!("{}:{}", app.repo_full_name(), app.branch()),
                local_folder: app.local_folder().display().to_string(),
                version: app.version().await?,
            });
        }
        Ok(reports)
    }

    /// Download and install one app without starting it.
    pub async fn deploy(&self, id: &str) -> Result<DownloadResult> {
        let app = self
            .registry
            .get(id)
            .ok_or_else(|| AppError::app_not_found(id))?;
        app.download(DownloadOptions::default()).await
    }

    /// Run the gateway until Ctrl-C, then stop every app process.
    pub async fn serve(self) -> Result<()> {
        self.spawn_startup();
        if self.config.check_interval_secs > 0 {
            self.spawn_status_monitor(Duration::from_secs(self.config.check_interval_secs));
        }

        let gateway = GatewayApi::new(
            self.base_route.clone(),
            Arc::clone(&self.aggregator),
            Arc::clone(&self.link),
        );
        let listener = tokio::net::TcpListener::bind(&self.config.listen)
            .await
            .map_err(|e| AppError::io(format!("Failed to bind {}: {}", self.config.listen, e)))?;
        log::info!(
            "Serving status of {} apps at {} on {}",
            self.registry.len(),
            self.base_route,
            self.config.listen
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        };
        let served = axum::serve(listener, router(vec![gateway]))
            .with_graceful_shutdown(shutdown)
            .await;

        log::info!("Shutting down, stopping all apps...");
        self.processes.stop_all().await;
        served.map_err(|e| AppError::io(format!("HTTP server failed: {}", e)))
    }

    /// Connect the supervisor, then deploy apps that were never installed and
    /// start every app.
    fn spawn_startup(&self) {
        let processes = Arc::clone(&self.processes);
        let registry = Arc::clone(&self.registry);
        let link = Arc::clone(&self.link);

        tokio::spawn(async move {
            if let Err(e) = processes.connect().await {
                log::error!("Failed to connect to the process supervisor: {}", e);
                return;
            }
            link.mark_ready();

            for app in registry.iter() {
                if !app.is_deployed() {
                    if let Err(e) = app.download(DownloadOptions::default()).await {
                        log::error!("Failed to deploy app {}: {}", app.id(), e);
                        continue;
                    }
                }
                app.start().await;
            }
        });
    }

    /// Periodically derive the fleet status so updates are picked up without
    /// anyone polling the gateway.
    fn spawn_status_monitor(&self, every: Duration) {
        let aggregator = Arc::clone(&self.aggregator);
        let link = Arc::clone(&self.link);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if !link.is_ready() {
                    continue;
                }
                if let Err(e) = aggregator.list_statuses().await {
                    log::warn!("Periodic status check failed: {}", e);
                }
            }
        });
    }
}
