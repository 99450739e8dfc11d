//! Default values and well-known names.
//!
//! This module provides centralized defaults used by the library and the
//! CLI, so file names and environment variables are spelled in one place.

use std::path::{Path, PathBuf};

/// Name of the manifest file kept at each library root.
pub const MANIFEST_FILE_NAME: &str = ".owlbot-manifest.json";

/// Name of the per-library customization file.
pub const CUSTOMIZATION_FILE_NAME: &str = ".owlbot.yaml";

/// Directory at the repository root that holds staged libraries.
pub const STAGING_DIR_NAME: &str = "owl-bot-staging";

/// Environment variable overriding the repository root.
pub const REPO_ROOT_ENV: &str = "OWLBOT_REPO_ROOT";

/// Environment variable overriding the staging directory name.
pub const STAGING_DIR_ENV: &str = "OWLBOT_STAGING_DIR";

/// Environment variable restricting a run to one staged library.
pub const LIBRARY_ENV: &str = "OWLBOT_LIBRARY";

/// Returns the default staging root for a repository.
///
/// This can be overridden by the `--staging-dir` CLI flag or the
/// `OWLBOT_STAGING_DIR` environment variable.
pub fn default_staging_root(repo_root: &Path) -> PathBuf {
    repo_root.join(STAGING_DIR_NAME)
}
