use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

fn has_windows_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

/// Convert an archive entry path to a relative PathBuf, rejecting absolute or traversal paths.
pub(crate) fn parse_entry_rel_path(raw: &str) -> Option<PathBuf> {
    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') || has_windows_drive_prefix(&normalized) {
        return None;
    }

    let mut relative = PathBuf::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            _ => relative.push(part),
        }
    }

    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

/// Map a repository tarball entry to its path relative to `sub_path`.
///
/// Repository tarballs wrap everything in a single `<owner>-<repo>-<sha>/` folder,
/// which is always dropped. Entries outside `sub_path`, and the `sub_path` folder
/// itself, map to `None`.
pub(crate) fn subtree_relative(relative: &Path, sub_path: &Path) -> Option<PathBuf> {
    let mut components = relative.components();
    components.next()?;
    let inside_root = components.as_path();

    let stripped = inside_root.strip_prefix(sub_path).ok()?;
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped.to_path_buf())
    }
}

/// Canonicalize the longest existing prefix of a path, appending any remaining components.
fn canonicalize_longest_prefix(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::Normal(segment) => normalized.push(segment),
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    return Err(AppError::io(format!(
                        "failed to normalize path {path:?}: parent traversal escapes root",
                    )));
                }
            }
        }
    }

    let mut current = normalized.clone();
    let mut missing: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match current.canonicalize() {
            Ok(mut canonical) => {
                canonical.extend(missing.into_iter().rev());
                return Ok(canonical);
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let Some(name) = current.file_name().map(|n| n.to_owned()) else {
                    return Err(AppError::io(format!(
                        "failed to canonicalize path {normalized:?}: reached filesystem root",
                    )));
                };
                missing.push(name);
                current.pop();
            }
            Err(error) => {
                return Err(AppError::io(format!(
                    "failed to canonicalize path {current:?}: {error}",
                )));
            }
        }
    }
}

/// Verify that `path` resolves to a location within `base_dir`, returning the canonical path.
pub(super) fn resolve_within_dir(base_dir: &Path, path: &Path) -> Result<PathBuf> {
    let canonical_base = base_dir
        .canonicalize()
        .map_err(|e| AppError::io(format!("failed to canonicalize base dir: {e}")))?;
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        canonical_base.join(path)
    };
    let canonical_candidate = canonicalize_longest_prefix(&candidate)?;

    if !canonical_candidate.starts_with(&canonical_base) {
        return Err(AppError::io(format!(
            "repository entry {path:?} escapes the app folder",
        )));
    }

    Ok(canonical_candidate)
}

/// Symlink targets must be relative and stay inside the extracted tree.
pub(super) fn validate_link_target(target: &Path) -> Result<()> {
    if target.as_os_str().is_empty() {
        return Err(AppError::io("symlink target path is empty"));
    }
    let windows_prefix = target
        .components()
        .any(|component| matches!(component, Component::Prefix(_)))
        || target.to_str().map(has_windows_drive_prefix).unwrap_or(false);
    if target.is_absolute() || windows_prefix {
        return Err(AppError::io(format!(
            "absolute symlink target {target:?} is not allowed",
        )));
    }
    Ok(())
}
