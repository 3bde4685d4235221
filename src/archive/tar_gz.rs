use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

use super::extract::{create_dir, write_file};
use super::links::{create_queued_symlinks, queue_symlink, QueuedSymlink};
use super::path::{parse_entry_rel_path, resolve_within_dir, subtree_relative};

fn open_archive(bytes: &[u8]) -> tar::Archive<flate2::read::GzDecoder<&[u8]>> {
    tar::Archive::new(flate2::read::GzDecoder::new(bytes))
}

fn entry_raw_path<R: std::io::Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let entry_path = entry.path().map_err(|e| AppError::io(e.to_string()))?;
    entry_path
        .as_ref()
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::io(format!(
                "archive entry path is not valid UTF-8: {:?}",
                entry_path
            ))
        })
}

/// Map an entry to its location relative to `sub_path`, or `None` to skip it.
fn mapped_entry_path(raw_path: &str, sub_path: &Path) -> Result<Option<PathBuf>> {
    let relative = parse_entry_rel_path(raw_path).ok_or_else(|| {
        AppError::io(format!("archive contains unsafe entry path: {raw_path:?}"))
    })?;
    Ok(subtree_relative(&relative, sub_path))
}

fn is_extracted_type(entry_type: tar::EntryType) -> bool {
    entry_type.is_file() || entry_type.is_dir() || entry_type.is_symlink()
}

/// List the regular files of a repository tarball that live under `sub_path`,
/// relative to `sub_path`.
pub(crate) fn list_tar_gz_subtree(bytes: &[u8], sub_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_archive(bytes);
    let mut files = Vec::new();

    for entry in archive.entries().map_err(|e| AppError::io(e.to_string()))? {
        let entry = entry.map_err(|e| AppError::io(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() && !entry_type.is_symlink() {
            continue;
        }
        if let Some(relative) = mapped_entry_path(&entry_raw_path(&entry)?, sub_path)? {
            files.push(relative);
        }
    }

    Ok(files)
}

/// Extract the part of a repository tarball under `sub_path` into `dest_dir`.
///
/// Existing files with the same names are overwritten; other files in
/// `dest_dir` are left alone. Returns the written paths relative to `dest_dir`.
pub(crate) fn extract_tar_gz_subtree(
    bytes: &[u8],
    sub_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>> {
    create_dir(dest_dir)?;
    let mut archive = open_archive(bytes);
    let mut written = Vec::new();
    let mut pending_symlinks: Vec<QueuedSymlink> = Vec::new();

    for entry in archive.entries().map_err(|e| AppError::io(e.to_string()))? {
        let mut entry = entry.map_err(|e| AppError::io(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if !is_extracted_type(entry_type) {
            // pax headers and the like carry no files
            continue;
        }

        let raw_path = entry_raw_path(&entry)?;
        let Some(relative) = mapped_entry_path(&raw_path, sub_path)? else {
            continue;
        };

        if entry_type.is_dir() {
            create_dir(&resolve_within_dir(dest_dir, &relative)?)?;
            continue;
        }

        // Resolve the parent only, so an existing symlink at the entry path is replaced
        // rather than followed.
        let file_name = relative
            .file_name()
            .ok_or_else(|| AppError::io(format!("archive entry has no file name: {raw_path:?}")))?;
        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        let out_dir = resolve_within_dir(dest_dir, parent)?;
        create_dir(&out_dir)?;
        let out_path = out_dir.join(file_name);

        if entry_type.is_symlink() {
            let target = entry
                .link_name()
                .map_err(|e| AppError::io(e.to_string()))?
                .ok_or_else(|| AppError::io("symlink entry missing link target"))?;
            pending_symlinks.push(queue_symlink(&out_path, target.as_ref(), dest_dir)?);
        } else {
            let mode = entry.header().mode().ok();
            let size = entry
                .header()
                .size()
                .map_err(|e| AppError::io(e.to_string()))?;
            write_file(&out_path, &mut entry, mode, size)?;
        }
        written.push(relative);
    }

    create_queued_symlinks(pending_symlinks)?;

    Ok(written)
}
