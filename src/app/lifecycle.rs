//! App lifecycle: start, stop and update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::{DownloadOptions, DownloadResult, UpdateOptions};
use super::App;
use crate::error::{AppError, Result};
use crate::supervisor::StartRequest;

/// Holds the downloading flag of an app; clears it when dropped, including on
/// failure and during unwinding.
pub(super) struct DownloadGuard {
    flag: Arc<AtomicBool>,
}

impl DownloadGuard {
    /// Set the flag, or return `None` if it is already set.
    pub(super) fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl App {
    /// (Re)start the app process. Errors are logged, never returned.
    pub async fn start(&self) {
        let _lock = self.lifecycle.lock().await;

        if let Err(e) = self.supervisor.stop_process(&self.id).await {
            log::debug!("No previous process to stop for app {}: {}", self.id, e);
        }

        let port = self.port.to_string();
        let request = StartRequest {
            name: self.id.clone(),
            cwd: self.local_folder.clone(),
            args: vec!["--port".to_string(), port.clone()],
            envs: vec![("PORT".to_string(), port)],
        };
        match self.supervisor.start_process(request).await {
            Ok(()) => log::info!("App {} started on port {}", self.id, self.port),
            Err(e) => log::error!("Failed to start app {}: {}", self.id, e),
        }
    }

    /// Stop the app process. Errors are logged, never returned.
    pub async fn stop(&self) {
        let _lock = self.lifecycle.lock().await;
        match self.supervisor.stop_process(&self.id).await {
            Ok(()) => log::info!("App {} stopped", self.id),
            Err(e) => log::error!("Failed to stop app {}: {}", self.id, e),
        }
    }

    /// Download and install the branch head, then restart if requested.
    pub async fn update(&self, options: UpdateOptions) -> Result<DownloadResult> {
        let guard = DownloadGuard::acquire(&self.downloading)
            .ok_or_else(|| AppError::update_in_progress(&self.id))?;
        self.run_update(guard, options).await
    }

    /// Start a background update with restart unless one is already running.
    /// Returns whether an update was spawned.
    pub fn spawn_update(self: &Arc<Self>) -> bool {
        let Some(guard) = DownloadGuard::acquire(&self.downloading) else {
            return false;
        };

        let app = Arc::clone(self);
        tokio::spawn(async move {
            match app.run_update(guard, UpdateOptions { start: true }).await {
                Ok(result) => log::info!("App {} updated to {}", result.id, result.commit),
                Err(e) => log::error!("Failed to update app {}: {}", app.id, e),
            }
        });
        true
    }

    async fn run_update(
        &self,
        _guard: DownloadGuard,
        options: UpdateOptions,
    ) -> Result<DownloadResult> {
        log::info!("Updating app {}", self.id);
        let result = self.download(DownloadOptions { install: true }).await?;
        if options.start {
            self.start().await;
        }
        Ok(result)
    }
}
