//! Centralized path utilities for the application.

use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Folder apps are downloaded into when none is configured.
pub const DEFAULT_TARGET_FOLDER: &str = "./.build";

/// Name of the file recording which commit is installed in an app folder.
pub const INSTALL_MARKER_FILE: &str = ".app-sync.toml";

/// Get the default config file path (`<config dir>/app-sync/config.toml`).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("app-sync")
        .join("config.toml")
}

/// Resolve a possibly relative folder against the current working directory.
pub fn absolute_folder(folder: &Path) -> Result<PathBuf> {
    let joined = if folder.is_absolute() {
        folder.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| AppError::io(format!("Failed to read working directory: {}", e)))?
            .join(folder)
    };
    Ok(normalize_lexically(&joined))
}

/// Get the local folder of an app: `<target_folder>/<id>`.
pub fn app_folder(target_folder: &Path, id: &str) -> Result<PathBuf> {
    Ok(absolute_folder(target_folder)?.join(id))
}

/// Get the install marker path inside an app folder.
pub fn install_marker_path(local_folder: &Path) -> PathBuf {
    local_folder.join(INSTALL_MARKER_FILE)
}

/// Drop `.` components and fold `..` without touching the file system.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
