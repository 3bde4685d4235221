//! App-related type definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Run the install step after the files are saved.
    pub install: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self { install: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Restart the app once the new version is installed.
    pub start: bool,
}

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub id: String,
    pub commit: String,
    /// Saved files, relative to the app folder.
    pub files: Vec<PathBuf>,
    pub installed: bool,
}

/// Local and remote version markers of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub local: Option<String>,
    pub remote: String,
    pub is_downloading: bool,
    pub update_required: bool,
}

impl VersionInfo {
    pub fn new(local: Option<String>, remote: String, is_downloading: bool) -> Self {
        let update_required = local.as_deref() != Some(remote.as_str()) && !is_downloading;
        Self {
            local,
            remote,
            is_downloading,
            update_required,
        }
    }
}

/// Contents of the install marker file kept in every app folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMarker {
    pub commit: String,
    pub branch: String,
    pub installed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_required_when_markers_differ() {
        let info = VersionInfo::new(Some("abc".into()), "def".into(), false);
        assert!(info.update_required);

        let info = VersionInfo::new(None, "def".into(), false);
        assert!(info.update_required);
    }

    #[test]
    fn no_update_when_current_or_downloading() {
        assert!(!VersionInfo::new(Some("abc".into()), "abc".into(), false).update_required);
        assert!(!VersionInfo::new(Some("abc".into()), "def".into(), true).update_required);
    }

    #[test]
    fn install_defaults_to_true() {
        assert!(DownloadOptions::default().install);
        assert!(!UpdateOptions::default().start);
    }
}
