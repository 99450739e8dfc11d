//! # Tree reconciliation
//!
//! This module merges a staged (freshly generated) tree into a destination
//! library directory. It walks both trees in lock-step, one directory level
//! at a time, and puts every child name into one of three buckets:
//!
//! - **destination only**: a removal candidate. Previously generated files
//!   are deleted; everything else is kept. Kept files become static unless
//!   they are gitignored (invisible to the tool) or the manifest itself.
//! - **staged only**: an addition. Files go through the modifier pipeline
//!   and are written unless a modifier vetoes them.
//! - **both**: a change. Directories recurse; type conflicts are resolved in
//!   favour of the staged object; files go through the modifier pipeline
//!   with both contents.
//!
//! Directories that end up empty because all their children were obsolete
//! generated output are removed as well.
//!
//! All per-path anomalies are warnings. The only errors are the structural
//! ones (missing roots, reconciling twice) and failed filesystem writes.
//!
//! ## Classification
//!
//! A written or unchanged file is recorded as generated when staged content
//! was used, and static otherwise: either there was no staged file, or a
//! destination-retaining modifier (such as `prevent_overwrite`) replaced
//! differing staged bytes with the existing ones. A staged file identical to
//! the destination stays generated, so repeated runs agree.

use crate::defaults::MANIFEST_FILE_NAME;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::git::{IgnoreCheck, NoIgnore};
use crate::manifest::{self, Manifest, ManifestBuilder};
use crate::modifiers::{ModifierPipeline, PipelineOutput};
use crate::path::{EntryKind, PathView};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What happened to one file during content application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Written,
    Unchanged,
    Deleted,
    Vetoed,
}

/// Counters for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub written: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub kept: usize,
    pub vetoed: usize,
}

/// Everything one merge of a staged tree into a destination tree needs.
///
/// A context is built once per destination tree, reconciled once, and then
/// asked for the next manifest.
pub struct ReconciliationContext {
    staging_root: PathBuf,
    destination_root: PathBuf,
    manifest_name: String,
    previous: Manifest,
    pipeline: ModifierPipeline,
    ignore: Box<dyn IgnoreCheck>,
    next: ManifestBuilder,
    stats: ReconcileStats,
    reconciled: bool,
}

impl ReconciliationContext {
    /// Create a context with an empty previous manifest, an empty pipeline
    /// and no ignore rules.
    pub fn new(staging_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Result<Self> {
        let context = Self {
            staging_root: staging_root.into(),
            destination_root: destination_root.into(),
            manifest_name: MANIFEST_FILE_NAME.to_string(),
            previous: Manifest::default(),
            pipeline: ModifierPipeline::new(),
            ignore: Box::new(NoIgnore),
            next: ManifestBuilder::new(),
            stats: ReconcileStats::default(),
            reconciled: false,
        };
        context.check_roots()?;
        Ok(context)
    }

    pub fn with_previous_manifest(mut self, previous: Manifest) -> Self {
        self.previous = previous;
        self
    }

    /// Load the previous manifest from the destination root.
    pub fn with_manifest_from_disk(self) -> Self {
        let previous = Manifest::load(&self.manifest_path());
        self.with_previous_manifest(previous)
    }

    pub fn with_pipeline(mut self, pipeline: ModifierPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_ignore(mut self, ignore: impl IgnoreCheck + 'static) -> Self {
        self.ignore = Box::new(ignore);
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.destination_root.join(&self.manifest_name)
    }

    pub fn previous(&self) -> &Manifest {
        &self.previous
    }

    pub fn next(&self) -> &ManifestBuilder {
        &self.next
    }

    pub fn pipeline(&self) -> &ModifierPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut ModifierPipeline {
        &mut self.pipeline
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    fn check_roots(&self) -> Result<()> {
        if !self.staging_root.is_dir() {
            return Err(Error::StagingRootMissing {
                path: self.staging_root.clone(),
            });
        }
        if !self.destination_root.is_dir() {
            return Err(Error::DestinationRootMissing {
                path: self.destination_root.clone(),
            });
        }
        Ok(())
    }

    /// Merge the staged tree into the destination tree.
    ///
    /// Fails with [`Error::AlreadyReconciled`] when called a second time.
    pub fn reconcile(&mut self) -> Result<()> {
        if self.reconciled {
            return Err(Error::AlreadyReconciled {
                path: self.staging_root.clone(),
            });
        }
        self.check_roots()?;
        self.reconciled = true;

        log::info!(
            "Reconciling {} into {}",
            self.staging_root.display(),
            self.destination_root.display()
        );
        let staging_root = self.staging_root.clone();
        let destination_root = self.destination_root.clone();
        let root = PathView::root(&staging_root, &destination_root);
        self.reconcile_directory(&root)?;

        let stats = self.stats;
        log::info!(
            "Reconciled {}: {} written, {} unchanged, {} deleted, {} kept, {} vetoed",
            self.destination_root.display(),
            stats.written,
            stats.unchanged,
            stats.deleted,
            stats.kept,
            stats.vetoed
        );
        Ok(())
    }

    /// Resynchronize the next manifest with the destination tree as it is now.
    pub fn recompute_manifest(&mut self) -> Result<()> {
        manifest::recompute_from_tree(
            &self.destination_root,
            &self.manifest_name,
            self.ignore.as_ref(),
            &mut self.next,
        )
    }

    /// The next manifest, sorted.
    pub fn finish(&self) -> Manifest {
        self.next.finalize()
    }

    /// Write the next manifest to the destination root and return it.
    pub fn save_manifest(&self) -> Result<Manifest> {
        let manifest = self.finish();
        manifest.save(&self.manifest_path())?;
        Ok(manifest)
    }

    fn reconcile_directory(&mut self, view: &PathView<'_>) -> Result<()> {
        let staged = view.staged_children();
        let destination = view.destination_children();
        let names: BTreeSet<&String> = staged.iter().chain(destination.iter()).collect();

        for name in names {
            let child = view.child(name);
            match (staged.contains(name), destination.contains(name)) {
                (false, true) => {
                    self.remove(&child)?;
                }
                (true, false) => self.add(&child)?,
                (true, true) => self.change(&child)?,
                (false, false) => {}
            }
        }
        Ok(())
    }

    /// Handle a destination-only path. Returns whether it was deleted.
    fn remove(&mut self, view: &PathView<'_>) -> Result<bool> {
        match view.destination_kind() {
            EntryKind::Absent => Ok(true),
            EntryKind::Directory => {
                let mut all_removed = true;
                for name in view.destination_children() {
                    let removed = self.remove(&view.child(name))?;
                    all_removed = all_removed && removed;
                }
                if all_removed {
                    filesystem::remove_empty_dir(&view.destination_path())?;
                    log::info!("Removed directory {}", view);
                }
                Ok(all_removed)
            }
            EntryKind::File | EntryKind::Symlink => self.remove_leaf(view),
        }
    }

    fn remove_leaf(&mut self, view: &PathView<'_>) -> Result<bool> {
        let path = view.relative_path();

        if path == self.manifest_name {
            log::debug!("Leaving manifest {} untouched", path);
            return Ok(false);
        }

        if self.previous.is_generated(path) {
            if view.destination_kind() == EntryKind::Symlink {
                filesystem::remove_recursive(&view.destination_path())?;
                log::info!("Deleted obsolete generated symlink {}", path);
                self.stats.deleted += 1;
                return Ok(true);
            }
            let destination = view.destination_content();
            let output = self.pipeline.run(path, None, destination);
            let outcome = self.apply_content(view, None, destination, true, output)?;
            return Ok(outcome == Outcome::Deleted);
        }

        if self.ignore.is_gitignored(path) {
            log::warn!("Keeping gitignored file {}; it is not tracked in the manifest", path);
            self.stats.kept += 1;
            return Ok(false);
        }

        log::info!("Keeping static file {}", path);
        self.next.record_static(path);
        self.stats.kept += 1;
        Ok(false)
    }

    /// Handle a staged-only path.
    fn add(&mut self, view: &PathView<'_>) -> Result<()> {
        let path = view.relative_path();
        if path == self.manifest_name {
            log::warn!("Staged tree contains {}; the manifest is never generated", path);
            return Ok(());
        }

        match view.staged_kind() {
            EntryKind::Symlink => {
                let target = match view.staged_symlink_target() {
                    Some(target) => target,
                    None => {
                        log::warn!("Skipping unreadable staged symlink {}", path);
                        return Ok(());
                    }
                };
                filesystem::create_symlink(target, &view.destination_path())?;
                log::info!("Created symlink {} -> {}", path, target.display());
                self.next.record_generated(path);
                self.stats.written += 1;
            }
            EntryKind::File => {
                let staged = match view.staged_content() {
                    Some(staged) => staged,
                    None => {
                        log::warn!("Skipping unreadable staged file {}", path);
                        return Ok(());
                    }
                };
                let output = self.pipeline.run(path, Some(staged), None);
                self.apply_content(view, Some(staged), None, false, output)?;
            }
            EntryKind::Directory => {
                filesystem::mkdir(&view.destination_path())?;
                log::debug!("Created directory {}", path);
                for name in view.staged_children() {
                    self.add(&view.child(name))?;
                }
            }
            EntryKind::Absent => {}
        }
        Ok(())
    }

    /// Handle a path present on both sides.
    fn change(&mut self, view: &PathView<'_>) -> Result<()> {
        let path = view.relative_path();
        if path == self.manifest_name {
            log::warn!("Staged tree contains {}; the manifest is never overwritten", path);
            return Ok(());
        }

        let destination_kind = view.destination_kind();
        match view.staged_kind() {
            EntryKind::Directory => {
                if destination_kind == EntryKind::Directory {
                    return self.reconcile_directory(view);
                }
                log::warn!("Replacing {} {} with a staged directory", destination_kind, path);
                filesystem::remove_recursive(&view.destination_path())?;
                self.add(view)
            }
            EntryKind::Symlink => {
                if destination_kind == EntryKind::Symlink {
                    log::debug!("Replacing symlink {}", path);
                } else {
                    log::warn!("Replacing {} {} with a staged symlink", destination_kind, path);
                }
                filesystem::remove_recursive(&view.destination_path())?;
                self.add(view)
            }
            EntryKind::File => {
                let staged = match view.staged_content() {
                    Some(staged) => staged,
                    None => {
                        log::warn!("Skipping unreadable staged file {}", path);
                        return Ok(());
                    }
                };
                let destination = if destination_kind == EntryKind::File {
                    view.destination_content()
                } else {
                    log::warn!("Replacing {} {} with a staged file", destination_kind, path);
                    filesystem::remove_recursive(&view.destination_path())?;
                    None
                };

                if destination.is_some() {
                    self.warn_on_overwrite(path);
                }
                let output = self.pipeline.run(path, Some(staged), destination);
                self.apply_content(view, Some(staged), destination, destination.is_some(), output)?;
                Ok(())
            }
            EntryKind::Absent => Ok(()),
        }
    }

    /// Advisory warnings for a staged file landing on a file the tool does
    /// not own. Emitted before the pipeline runs, whatever its result.
    fn warn_on_overwrite(&self, path: &str) {
        if self.ignore.is_gitignored(path) {
            log::warn!("Overwriting gitignored file {}", path);
        } else if !self.previous.generated.is_empty() && !self.previous.is_generated(path) {
            log::warn!("Overwriting static file {} with generated content", path);
        }
    }

    /// Make the destination file match the pipeline output and record it.
    fn apply_content(
        &mut self,
        view: &PathView<'_>,
        staged: Option<&[u8]>,
        destination: Option<&[u8]>,
        destination_exists: bool,
        output: PipelineOutput,
    ) -> Result<Outcome> {
        let path = view.relative_path();
        let destination_path = view.destination_path();

        let content = match output.content {
            Some(content) => content,
            None if destination_exists => {
                filesystem::remove_recursive(&destination_path)?;
                if staged.is_none() {
                    log::info!("Deleted obsolete generated file {}", path);
                } else {
                    log::info!("Deleted {}: modifiers returned no content", path);
                }
                self.stats.deleted += 1;
                return Ok(Outcome::Deleted);
            }
            None => {
                log::info!("Skipped {}: modifiers returned no content", path);
                self.stats.vetoed += 1;
                return Ok(Outcome::Vetoed);
            }
        };

        let outcome = if destination == Some(content.as_slice()) {
            log::debug!("Unchanged {}", path);
            self.stats.unchanged += 1;
            Outcome::Unchanged
        } else {
            match staged {
                Some(staged) => {
                    filesystem::copy(&view.staged_path(), &destination_path)?;
                    if content.as_slice() != staged {
                        filesystem::write(&destination_path, &content)?;
                        log::info!("Wrote {} (modified)", path);
                    } else {
                        log::info!("Wrote {}", path);
                    }
                }
                None => {
                    filesystem::write(&destination_path, &content)?;
                    log::info!("Wrote {} (from modifiers)", path);
                }
            }
            self.stats.written += 1;
            Outcome::Written
        };

        if staged.is_some() && !output.retained_destination {
            self.next.record_generated(path);
        } else {
            self.next.record_static(path);
        }
        Ok(outcome)
    }
}
