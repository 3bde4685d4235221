//! Local/remote version markers.

use std::path::Path;

use super::types::{InstallMarker, VersionInfo};
use super::App;
use crate::error::{AppError, Result};
use crate::paths::install_marker_path;

impl App {
    /// Compare the installed commit with the head commit of the branch.
    pub async fn version(&self) -> Result<VersionInfo> {
        let local = read_install_marker(&self.local_folder)
            .await
            .map(|marker| marker.commit);
        let remote = self
            .repo
            .head(&self.branch)
            .await
            .map_err(|e| AppError::version_inquiry(&self.id, e.to_string()))?;

        Ok(VersionInfo::new(local, remote, self.is_downloading()))
    }
}

/// Read the install marker of an app folder. A missing or unreadable marker means
/// nothing is installed.
pub async fn read_install_marker(local_folder: &Path) -> Option<InstallMarker> {
    let path = install_marker_path(local_folder);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("Failed to read install marker {:?}: {}", path, e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(marker) => Some(marker),
        Err(e) => {
            log::warn!("Ignoring malformed install marker {:?}: {}", path, e);
            None
        }
    }
}

pub async fn write_install_marker(local_folder: &Path, marker: &InstallMarker) -> Result<()> {
    let path = install_marker_path(local_folder);
    let content = toml::to_string_pretty(marker)?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| AppError::io(format!("Failed to write install marker {:?}: {}", path, e)))
}
