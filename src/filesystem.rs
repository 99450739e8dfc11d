//! Raw filesystem primitives used by the reconciliation engine
//!
//! Every mutation of the destination tree goes through this module so that
//! failures carry the offending path in a `Error::Filesystem` message.
//! Reads for classification live in [`crate::path`] instead, where missing or
//! unreadable objects are represented as absence rather than errors.

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Copy a regular file, keeping the source's permission bits.
pub fn copy(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to copy '{}' to '{}': {}",
            src.display(),
            dst.display(),
            e
        ),
    })?;
    Ok(())
}

/// Write bytes to a file, replacing any existing content.
pub fn write(dst: &Path, content: &[u8]) -> Result<()> {
    fs::write(dst, content).map_err(|e| Error::filesystem("write file", dst, e))
}

/// Create a directory and any missing parents.
pub fn mkdir(dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::filesystem("create directory", dst, e))
}

/// Remove a file, symlink or directory tree. Missing paths are not an error.
///
/// Symlinks are removed as links; their targets are never followed.
pub fn remove_recursive(dst: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(dst) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::filesystem("inspect", dst, e)),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(dst).map_err(|e| Error::filesystem("remove directory", dst, e))
    } else {
        fs::remove_file(dst).map_err(|e| Error::filesystem("remove", dst, e))
    }
}

/// Remove a directory that is expected to be empty.
pub fn remove_empty_dir(dst: &Path) -> Result<()> {
    fs::remove_dir(dst).map_err(|e| Error::filesystem("remove directory", dst, e))
}

/// Create a symlink at `dst` pointing at `target`.
#[cfg(unix)]
pub fn create_symlink(target: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, dst).map_err(|e| Error::filesystem("create symlink", dst, e))
}

/// Create a symlink at `dst` pointing at `target`.
#[cfg(not(unix))]
pub fn create_symlink(_target: &Path, dst: &Path) -> Result<()> {
    Err(Error::Filesystem {
        message: format!(
            "Failed to create symlink '{}': symlinks are only supported on unix",
            dst.display()
        ),
    })
}

/// Read the target of a symlink without resolving it.
pub fn read_symlink_target(path: &Path) -> Result<PathBuf> {
    fs::read_link(path).map_err(|e| Error::filesystem("read symlink", path, e))
}

/// List the entry names of a directory in sorted order.
///
/// Names that are not valid UTF-8 are skipped with a warning, since manifest
/// paths are stored as strings.
pub fn list_children(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| Error::filesystem("list directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::filesystem("list directory", dir, e))?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::warn!(
                "Skipping non UTF-8 entry {:?} in {}",
                raw,
                dir.display()
            ),
        }
    }
    names.sort();
    Ok(names)
}

/// Move a file or directory, creating the destination's parents.
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        mkdir(parent)?;
    }
    fs::rename(from, to).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to move '{}' to '{}': {}",
            from.display(),
            to.display(),
            e
        ),
    })
}
