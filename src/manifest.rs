//! # Generated/static manifest
//!
//! The manifest records which destination paths the tool owns (`generated`)
//! and which it saw but left alone (`static`) as of the last successful run.
//! It is what lets a later run delete generated files that the generator no
//! longer produces without touching hand-written files.
//!
//! ## File format
//!
//! ```json
//! {
//!   "generated": ["lib/foo.rb", "README.md"],
//!   "static": ["CHANGELOG.md"]
//! }
//! ```
//!
//! Both lists are sorted so the persisted file is stable across runs.
//!
//! ## Lifecycle
//!
//! 1. [`Manifest::load`] reads the previous manifest. A missing file is a
//!    first run; a malformed one is logged and treated the same way.
//! 2. The engine records decisions into a [`ManifestBuilder`].
//! 3. [`ManifestBuilder::finalize`] produces the next [`Manifest`], which the
//!    orchestrator writes back with [`Manifest::save`].
//!
//! [`recompute_from_tree`] resynchronizes a builder with the destination tree
//! after customization steps have moved or deleted files.

use crate::error::{Error, Result};
use crate::git::IgnoreCheck;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

/// The persisted record of generated and static paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Paths owned by the tool.
    #[serde(default)]
    pub generated: BTreeSet<String>,
    /// Paths present in the destination but not owned by the tool.
    #[serde(default, rename = "static")]
    pub static_files: BTreeSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest, failing soft.
    ///
    /// Missing files yield an empty manifest. Unreadable or malformed files
    /// yield an empty manifest and a warning.
    pub fn load(path: &Path) -> Manifest {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No manifest at {}; starting fresh", path.display());
                return Manifest::default();
            }
            Err(e) => {
                log::warn!("Unable to read manifest {}: {}", path.display(), e);
                return Manifest::default();
            }
        };

        match serde_json::from_str::<Manifest>(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Ignoring malformed manifest {}: {}", path.display(), e);
                Manifest::default()
            }
        }
    }

    /// Serialize to the persisted JSON form.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the manifest, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| Error::filesystem("write manifest", path, e))?;
        log::info!(
            "Wrote manifest {} ({} generated, {} static)",
            path.display(),
            self.generated.len(),
            self.static_files.len()
        );
        Ok(())
    }

    pub fn is_generated(&self, path: &str) -> bool {
        self.generated.contains(path)
    }

    pub fn is_static(&self, path: &str) -> bool {
        self.static_files.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.generated.is_empty() && self.static_files.is_empty()
    }

    /// A builder seeded with this manifest's lists.
    pub fn to_builder(&self) -> ManifestBuilder {
        ManifestBuilder {
            generated: self.generated.iter().cloned().collect(),
            static_files: self.static_files.iter().cloned().collect(),
        }
    }
}

/// Accumulates the next manifest during a run.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    generated: Vec<String>,
    static_files: Vec<String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generated(&mut self, path: impl Into<String>) {
        self.generated.push(path.into());
    }

    pub fn record_static(&mut self, path: impl Into<String>) {
        self.static_files.push(path.into());
    }

    pub fn generated(&self) -> &[String] {
        &self.generated
    }

    pub fn static_files(&self) -> &[String] {
        &self.static_files
    }

    /// Every path recorded so far, in either list.
    fn listed_paths(&self) -> HashSet<String> {
        self.generated.iter().chain(self.static_files.iter()).cloned().collect()
    }

    /// Keep only paths for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.generated.retain(|p| keep(p));
        self.static_files.retain(|p| keep(p));
    }

    /// Produce the sorted, deduplicated manifest.
    ///
    /// A path recorded as both generated and static stays generated.
    pub fn finalize(&self) -> Manifest {
        let generated: BTreeSet<String> = self.generated.iter().cloned().collect();
        let mut static_files: BTreeSet<String> = self.static_files.iter().cloned().collect();
        for path in generated.intersection(&static_files.clone()) {
            log::warn!("{} recorded as both generated and static; keeping generated", path);
            static_files.remove(path);
        }
        Manifest {
            generated,
            static_files,
        }
    }
}

/// Resynchronize `next` with the destination tree as it is now.
///
/// Listed paths that no longer exist are dropped. Files and symlinks that
/// are not listed are recorded as static, except gitignored paths, the
/// manifest file itself and anything under `.git`.
pub fn recompute_from_tree(
    destination_root: &Path,
    manifest_name: &str,
    ignore: &dyn IgnoreCheck,
    next: &mut ManifestBuilder,
) -> Result<()> {
    next.retain(|path| {
        let exists = fs::symlink_metadata(destination_root.join(path)).is_ok();
        if !exists {
            log::debug!("{} no longer exists; dropping from manifest", path);
        }
        exists
    });

    let listed = next.listed_paths();
    let walker = WalkDir::new(destination_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to walk '{}': {}", destination_root.display(), e),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let relative = match relative_string(destination_root, entry.path()) {
            Some(relative) => relative,
            None => continue,
        };
        if relative == manifest_name || listed.contains(&relative) {
            continue;
        }
        if ignore.is_gitignored(&relative) {
            log::debug!("{} is gitignored; leaving it out of the manifest", relative);
            continue;
        }
        log::info!("Recording {} as static", relative);
        next.record_static(relative);
    }

    Ok(())
}

fn relative_string(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    match parts {
        Some(parts) => Some(parts.join("/")),
        None => {
            log::warn!("Skipping non UTF-8 path {}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::NoIgnore;
    use tempfile::TempDir;

    const MANIFEST: &str = ".owlbot-manifest.json";

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::load(&temp.path().join(MANIFEST));
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_load_malformed_is_empty_and_warns() {
        testing_logger::setup();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST);
        fs::write(&path, "{ not json").unwrap();

        let manifest = Manifest::load(&path);

        assert!(manifest.is_empty());
        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|l| l.level == log::Level::Warn && l.body.contains("malformed manifest")));
        });
    }

    #[test]
    fn test_load_partial_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST);
        fs::write(&path, r#"{"generated": ["a.rb"]}"#).unwrap();

        let manifest = Manifest::load(&path);
        assert!(manifest.is_generated("a.rb"));
        assert!(manifest.static_files.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST);
        let mut builder = ManifestBuilder::new();
        builder.record_generated("lib/z.rb");
        builder.record_generated("README.md");
        builder.record_static("CHANGELOG.md");
        let manifest = builder.finalize();

        manifest.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with('\n'));
        assert!(written.contains("\"static\""));
        assert_eq!(Manifest::load(&path), manifest);
    }

    #[test]
    fn test_finalize_sorts_and_dedups() {
        let mut builder = ManifestBuilder::new();
        builder.record_generated("b");
        builder.record_generated("a");
        builder.record_generated("b");
        builder.record_static("z");
        builder.record_static("a");

        let manifest = builder.finalize();
        let generated: Vec<_> = manifest.generated.iter().cloned().collect();
        let static_files: Vec<_> = manifest.static_files.iter().cloned().collect();
        assert_eq!(generated, vec!["a", "b"]);
        assert_eq!(static_files, vec!["z"]);
    }

    #[test]
    fn test_to_json_shape() {
        let mut builder = ManifestBuilder::new();
        builder.record_generated("hello.txt");
        let json = builder.finalize().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["generated"][0], "hello.txt");
        assert!(value["static"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_recompute_from_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("lib/kept.rb"), "").unwrap();
        fs::write(root.join("lib/new.rb"), "").unwrap();
        fs::write(root.join("debug.log"), "").unwrap();
        fs::write(root.join(".git/HEAD"), "").unwrap();
        fs::write(root.join(MANIFEST), "{}").unwrap();

        let mut next = ManifestBuilder::new();
        next.record_generated("lib/kept.rb");
        next.record_generated("lib/moved.rb");

        let ignore = |path: &str| path.ends_with(".log");
        recompute_from_tree(root, MANIFEST, &ignore, &mut next).unwrap();

        let manifest = next.finalize();
        assert!(manifest.is_generated("lib/kept.rb"));
        assert!(!manifest.is_generated("lib/moved.rb"));
        assert!(manifest.is_static("lib/new.rb"));
        assert!(!manifest.is_static("debug.log"));
        assert!(!manifest.is_static(MANIFEST));
        assert!(!manifest.is_static(".git/HEAD"));
    }

    #[test]
    fn test_recompute_on_empty_tree() {
        let temp = TempDir::new().unwrap();
        let mut next = ManifestBuilder::new();
        recompute_from_tree(temp.path(), MANIFEST, &NoIgnore, &mut next).unwrap();
        assert!(next.finalize().is_empty());
    }

    #[test]
    fn test_recompute_records_each_listed_path_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut next = ManifestBuilder::new();
        for i in 0..200 {
            let name = format!("gen_{:03}.rb", i);
            fs::write(root.join(&name), "").unwrap();
            next.record_generated(name);
        }
        fs::write(root.join("notes.md"), "").unwrap();
        next.record_static("notes.md");
        fs::write(root.join("extra.md"), "").unwrap();

        recompute_from_tree(root, MANIFEST, &NoIgnore, &mut next).unwrap();

        assert_eq!(next.generated().len(), 200);
        assert_eq!(next.static_files(), &["notes.md".to_string(), "extra.md".to_string()]);
    }
}
