use std::fs;
use std::io;
use std::path::Path;

use crate::error::{AppError, Result};

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| AppError::io(format!("failed to set permissions on {path:?}: {e}")))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

pub(super) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| AppError::io(format!("failed to create directory {path:?}: {e}")))
}

/// Write one regular file, replacing whatever was at `out_path` before.
pub(super) fn write_file<R>(
    out_path: &Path,
    reader: &mut R,
    mode: Option<u32>,
    declared_size: u64,
) -> Result<()>
where
    R: io::Read,
{
    if let Some(parent) = out_path.parent() {
        create_dir(parent)?;
    }
    if out_path.is_symlink() || out_path.is_dir() {
        remove_existing(out_path)?;
    }

    let mut outfile = fs::File::create(out_path)
        .map_err(|e| AppError::io(format!("failed to create {out_path:?}: {e}")))?;
    let written = io::copy(reader, &mut outfile)
        .map_err(|e| AppError::io(format!("failed to write {out_path:?}: {e}")))?;
    if written != declared_size {
        return Err(AppError::io(format!(
            "entry size mismatch for {out_path:?}: expected {declared_size} bytes, wrote {written} bytes",
        )));
    }
    apply_mode(out_path, mode)
}

pub(super) fn remove_existing(path: &Path) -> Result<()> {
    let result = if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::io(format!("failed to replace {path:?}: {e}"))),
    }
}
