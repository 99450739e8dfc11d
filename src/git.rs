//! Gitignore queries
//!
//! The engine only needs a yes/no answer for a handful of destination-only
//! paths, so the default implementation asks the system `git` binary rather
//! than re-implementing ignore rules. Tests and callers without a repository
//! can use [`NoIgnore`] or any closure.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Answers whether a destination path is excluded by version-control ignore rules.
pub trait IgnoreCheck {
    /// `relative_path` is relative to the destination root.
    fn is_gitignored(&self, relative_path: &str) -> bool;
}

impl<F> IgnoreCheck for F
where
    F: Fn(&str) -> bool,
{
    fn is_gitignored(&self, relative_path: &str) -> bool {
        self(relative_path)
    }
}

/// Treats nothing as ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl IgnoreCheck for NoIgnore {
    fn is_gitignored(&self, _relative_path: &str) -> bool {
        false
    }
}

/// Runs `git check-ignore -q` from the destination root.
///
/// Exit status 0 means ignored and 1 means not ignored. Anything else (not a
/// repository, git missing) is logged at debug level and treated as not
/// ignored.
#[derive(Debug, Clone)]
pub struct GitCheckIgnore {
    work_dir: PathBuf,
}

impl GitCheckIgnore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

impl IgnoreCheck for GitCheckIgnore {
    fn is_gitignored(&self, relative_path: &str) -> bool {
        let output = Command::new("git")
            .args(["check-ignore", "-q", "--"])
            .arg(relative_path)
            .current_dir(&self.work_dir)
            .output();

        match output {
            Ok(output) => match output.status.code() {
                Some(0) => true,
                Some(1) => false,
                _ => {
                    log::debug!(
                        "git check-ignore failed for {}: {}",
                        relative_path,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                    false
                }
            },
            Err(e) => {
                log::debug!("Could not run git check-ignore for {}: {}", relative_path, e);
                false
            }
        }
    }
}
