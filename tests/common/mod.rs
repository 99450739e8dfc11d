//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let repo = RepoFixture::new().with_staged("google-cloud-foo", "lib/foo.rb", "# foo\n");
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::RepoFixture;
}

/// A temporary repository with a staging directory.
///
/// ```rust,ignore
/// let repo = RepoFixture::new()
///     .with_staged("lib-a", "a.rb", "a")
///     .with_existing("lib-a", "README.md", "readme");
/// ```
pub struct RepoFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl RepoFixture {
    /// Create an empty repository with an empty `owl-bot-staging` directory.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp dir");
        temp_dir
            .child("owl-bot-staging")
            .create_dir_all()
            .expect("Failed to create staging dir");
        Self { temp_dir }
    }

    /// Stage a file for a library.
    pub fn with_staged(self, library: &str, path: &str, content: &str) -> Self {
        self.stage(library, path, content);
        self
    }

    /// Add a file to a library's checked-in directory.
    pub fn with_existing(self, library: &str, path: &str, content: &str) -> Self {
        self.existing(library, path, content);
        self
    }

    pub fn stage(&self, library: &str, path: &str, content: &str) {
        self.temp_dir
            .child(format!("owl-bot-staging/{}/{}", library, path))
            .write_str(content)
            .expect("Failed to write staged file");
    }

    pub fn existing(&self, library: &str, path: &str, content: &str) {
        self.temp_dir
            .child(format!("{}/{}", library, path))
            .write_str(content)
            .expect("Failed to write existing file");
    }

    /// Repository root path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn staging_root(&self) -> PathBuf {
        self.path().join("owl-bot-staging")
    }

    /// Staged directory of a library.
    pub fn staged(&self, library: &str) -> PathBuf {
        self.staging_root().join(library)
    }

    /// Checked-in directory of a library.
    pub fn library(&self, library: &str) -> PathBuf {
        self.path().join(library)
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a checked-in file, `None` when missing.
    pub fn read(&self, library: &str, path: &str) -> Option<String> {
        std::fs::read_to_string(self.library(library).join(path)).ok()
    }
}

impl Default for RepoFixture {
    fn default() -> Self {
        Self::new()
    }
}
