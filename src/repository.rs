//! Repository client contract.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::archive::{extract_tar_gz_subtree, list_tar_gz_subtree};
use crate::error::{AppError, Result};

/// A parsed `user/repo[/sub/path]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub user: String,
    pub name: String,
    /// Sub-directory inside the repository, `""` for the whole repository.
    pub sub_path: String,
}

impl RepoRef {
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value
            .trim()
            .split('/')
            .filter(|part| !part.is_empty())
            .collect();
        let [user, name, rest @ ..] = parts.as_slice() else {
            return Err(AppError::config(format!(
                "A repo must have a 'user-name' and 'repo-name', eg 'username/repo' (got '{}')",
                value
            )));
        };

        Ok(Self {
            user: user.to_string(),
            name: name.to_string(),
            sub_path: rest.join("/"),
        })
    }

    /// `user/repo`, without the sub-path.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.user, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_path.is_empty() {
            write!(f, "{}/{}", self.user, self.name)
        } else {
            write!(f, "{}/{}/{}", self.user, self.name, self.sub_path)
        }
    }
}

/// Files of one repository sub-path at one commit, held in memory until saved.
#[derive(Debug, Clone)]
pub struct RemoteFiles {
    pub commit: String,
    pub sub_path: String,
    /// Paths relative to `sub_path`.
    pub files: Vec<PathBuf>,
    archive: Arc<Vec<u8>>,
}

impl RemoteFiles {
    /// Index a repository tarball (`<root>/<repo files>`) for the given sub-path.
    pub fn from_tarball(commit: &str, sub_path: &str, archive: Vec<u8>) -> Result<Self> {
        let files = list_tar_gz_subtree(&archive, Path::new(sub_path))?;
        Ok(Self {
            commit: commit.to_string(),
            sub_path: sub_path.to_string(),
            files,
            archive: Arc::new(archive),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write the files into `local_path`, overwriting files with the same names.
    pub async fn save(&self, local_path: &Path) -> Result<Vec<PathBuf>> {
        let archive = Arc::clone(&self.archive);
        let sub_path = PathBuf::from(&self.sub_path);
        let dest = local_path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_tar_gz_subtree(&archive, &sub_path, &dest))
            .await
            .map_err(|e| AppError::io(format!("Failed to join save task: {}", e)))?
    }
}

/// A resolved remote repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Repository name without the owner.
    fn name(&self) -> &str;

    /// `user/repo`.
    fn full_name(&self) -> &str;

    /// Current head commit of `branch`, used as the version marker.
    async fn head(&self, branch: &str) -> Result<String>;

    /// Fetch the files under `sub_path` at `git_ref` (a branch or a commit).
    /// An empty file set is a valid answer and is not an error.
    async fn get(&self, sub_path: &str, git_ref: &str) -> Result<RemoteFiles>;
}

/// Turns a `user/repo` name into a [`Repository`] handle.
pub trait RepositoryResolver: Send + Sync {
    fn resolve(
        &self,
        user_agent: &str,
        full_name: &str,
        token: Option<&str>,
    ) -> Result<Arc<dyn Repository>>;
}
