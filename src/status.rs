//! Fleet status: live process state joined with version markers.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use crate::app::{short_commit, App};
use crate::error::{AppError, Result};
use crate::registry::AppRegistry;
use crate::supervisor::{owner_app_id, ProcessRecord, ProcessSupervisor};

/// Status of one running app, as served by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub id: String,
    pub status: String,
    /// `<route> ⇨ <port>`.
    pub route: String,
    /// `<repo name>:<branch>`.
    pub repository: String,
    pub resources: Resources,
    pub version: VersionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// Human readable resident memory, e.g. `50.00 MB`.
    pub memory: String,
    pub cpu: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    pub local: Option<String>,
    pub repository: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_downloading: bool,
}

pub struct StatusAggregator {
    registry: Arc<AppRegistry>,
    supervisor: Arc<dyn ProcessSupervisor>,
}

impl StatusAggregator {
    pub fn new(registry: Arc<AppRegistry>, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        Self {
            registry,
            supervisor,
        }
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Status of every registered app that has a supervised process, sorted by id.
    pub async fn list_statuses(&self) -> Result<Vec<AppStatus>> {
        let processes = self.supervisor.list_processes().await?;

        // First process per app wins; the map also orders the output by id.
        let mut owned: BTreeMap<&str, (&Arc<App>, &ProcessRecord)> = BTreeMap::new();
        for process in &processes {
            let Some(app) = self.registry.get_by_process(&process.name) else {
                log::debug!("Ignoring process {} with no registered app", process.name);
                continue;
            };
            owned.entry(app.id()).or_insert((app, process));
        }

        let derivations = owned
            .into_values()
            .map(|(app, process)| app_status(app, process));
        let statuses = join_all(derivations)
            .await
            .into_iter()
            .filter_map(|status| match status {
                Ok(status) => Some(status),
                Err(e) => {
                    log::error!("Failed to get app status: {}", e);
                    None
                }
            })
            .collect();

        Ok(statuses)
    }

    /// Status of a single app.
    pub async fn get_status(&self, app_id: &str) -> Result<AppStatus> {
        let app = self
            .registry
            .get(app_id)
            .ok_or_else(|| AppError::app_not_found(app_id))?;

        let processes = self.supervisor.list_processes().await?;
        let process = processes
            .iter()
            .find(|process| owner_app_id(&process.name) == app_id)
            .ok_or_else(|| {
                AppError::process(format!("No supervised process for app '{}'", app_id))
            })?;

        app_status(app, process).await
    }
}

/// Build the status record of one app, triggering a background update when the
/// remote branch moved.
async fn app_status(app: &Arc<App>, process: &ProcessRecord) -> Result<AppStatus> {
    let version = app.version().await?;

    let mut status = process.status.clone();
    let mut is_downloading = version.is_downloading;
    if version.update_required {
        if app.spawn_update() {
            log::info!(
                "App {} is behind {}, update started",
                app.id(),
                short_commit(&version.remote)
            );
        }
        is_downloading = true;
    }
    if is_downloading {
        status.push_str(&format!(", updating to v{}", version.remote));
    }

    Ok(AppStatus {
        id: app.id().to_string(),
        status,
        route: format!("{} ⇨ {}", app.route(), app.port()),
        repository: format!("{}:{}", app.repo_name(), app.branch()),
        resources: Resources {
            memory: format_bytes(process.monit.memory),
            cpu: process.monit.cpu,
        },
        version: VersionStatus {
            local: version.local,
            repository: version.remote,
            is_downloading,
        },
    })
}

/// Human readable size in decimal units, e.g. `52.4 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    // Three significant digits, trailing zeros dropped.
    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else {
        2
    };
    let text = format!("{:.*}", decimals, value);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    format!("{} {}", text, unit)
}
