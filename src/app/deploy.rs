//! Fetching and installing app files.

use std::process::Stdio;

use chrono::Utc;
use tokio::process::Command;

use super::types::{DownloadOptions, DownloadResult, InstallMarker};
use super::version::write_install_marker;
use super::App;
use crate::error::{AppError, Result};

/// Number of trailing stderr lines kept in install errors.
const STDERR_TAIL_LINES: usize = 20;

impl App {
    /// Fetch the branch head into the app folder, optionally installing it.
    pub async fn download(&self, options: DownloadOptions) -> Result<DownloadResult> {
        let commit = self
            .repo
            .head(&self.branch)
            .await
            .map_err(|e| AppError::download(&self.id, e.to_string()))?;

        log::info!(
            "Downloading {}:{} ({}) for app {}",
            self.repo.full_name(),
            self.branch,
            short_commit(&commit),
            self.id
        );

        let remote = self
            .repo
            .get(&self.sub_path, &commit)
            .await
            .map_err(|e| AppError::download(&self.id, e.to_string()))?;
        if remote.is_empty() {
            return Err(AppError::download(
                &self.id,
                format!(
                    "No files found in {} under '{}' at {}",
                    self.repo.full_name(),
                    self.sub_path,
                    commit
                ),
            ));
        }

        let files = {
            let _lock = self.lifecycle.lock().await;
            tokio::fs::create_dir_all(&self.local_folder)
                .await
                .map_err(|e| AppError::download(&self.id, e.to_string()))?;
            remote
                .save(&self.local_folder)
                .await
                .map_err(|e| AppError::download(&self.id, e.to_string()))?
        };
        log::info!("Saved {} files into {:?}", files.len(), self.local_folder);

        if options.install {
            self.install().await?;
        }

        let marker = InstallMarker {
            commit: commit.clone(),
            branch: self.branch.clone(),
            installed_at: Utc::now(),
        };
        write_install_marker(&self.local_folder, &marker).await?;

        Ok(DownloadResult {
            id: self.id.clone(),
            commit,
            files,
            installed: options.install,
        })
    }

    /// Run the install command inside the app folder.
    pub async fn install(&self) -> Result<()> {
        let Some((program, args)) = self.install_command.split_first() else {
            log::info!("No install command for app {}, skipping install", self.id);
            return Ok(());
        };

        log::info!(
            "Installing app {}: {} in {:?}",
            self.id,
            self.install_command.join(" "),
            self.local_folder
        );

        let output = {
            let _lock = self.lifecycle.lock().await;
            Command::new(program)
                .args(args)
                .current_dir(&self.local_folder)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    AppError::install(&self.id, None, format!("Failed to run {}: {}", program, e))
                })?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::install(
                &self.id,
                output.status.code(),
                stderr_tail(&stderr),
            ));
        }

        log::info!("App {} installed", self.id);
        Ok(())
    }
}

pub(crate) fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
