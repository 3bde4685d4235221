use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

use super::extract::{create_dir, remove_existing};
use super::path::{resolve_within_dir, validate_link_target};

/// Symlinks are created after all regular files so their targets exist.
pub(super) struct QueuedSymlink {
    out_path: PathBuf,
    target: PathBuf,
}

#[cfg(unix)]
fn create_symlink(target: &Path, link_path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link_path)
        .map_err(|e| AppError::io(format!("failed to create symlink at {link_path:?}: {e}")))
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link_path: &Path) -> Result<()> {
    log::warn!(
        "Skipping symlink {:?} -> {:?}: not supported on this platform",
        link_path,
        target
    );
    Ok(())
}

pub(super) fn queue_symlink(
    out_path: &Path,
    target: &Path,
    dest_dir: &Path,
) -> Result<QueuedSymlink> {
    validate_link_target(target)?;

    let parent = out_path
        .parent()
        .ok_or_else(|| AppError::io("symlink entry has no parent directory"))?;
    resolve_within_dir(dest_dir, &parent.join(target))?;

    Ok(QueuedSymlink {
        out_path: out_path.to_path_buf(),
        target: target.to_path_buf(),
    })
}

pub(super) fn create_queued_symlinks(pending: Vec<QueuedSymlink>) -> Result<()> {
    for item in pending {
        if let Some(parent) = item.out_path.parent() {
            create_dir(parent)?;
        }
        remove_existing(&item.out_path)?;
        create_symlink(&item.target, &item.out_path)?;
    }
    Ok(())
}
