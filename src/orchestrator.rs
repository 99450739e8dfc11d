//! Orchestrator for a complete postprocessing run
//!
//! This module coordinates everything around the reconciliation engine:
//!
//! 1. Locate the staging root (`<repo>/owl-bot-staging` by default) and the
//!    staged libraries inside it, one directory per library.
//! 2. For each library, in sorted order:
//!    - resolve (and if needed create) the destination directory,
//!    - load the previous manifest and install the default modifiers,
//!    - execute the library's `.owlbot.yaml` steps, running the merge at the
//!      `merge` step or after the last step,
//!    - recompute the manifest if file steps edited the merged tree,
//!    - persist the manifest.
//! 3. Consume the staged library directories, and the staging root once it
//!    is empty, so the same staged output cannot be merged twice.

use crate::config::{self, Step};
use crate::defaults::{default_staging_root, CUSTOMIZATION_FILE_NAME, MANIFEST_FILE_NAME};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::git::GitCheckIgnore;
use crate::manifest::{self, Manifest};
use crate::modifiers::{builtin, globs, ModifierPipeline};
use crate::reconcile::{ReconcileStats, ReconciliationContext};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Options for [`run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Repository root holding the libraries and the staging directory.
    pub repo_root: PathBuf,
    /// Staging directory, relative to `repo_root` unless absolute.
    pub staging_dir: Option<PathBuf>,
    /// Only process this staged library.
    pub library: Option<String>,
    /// Leave staged directories in place after a successful merge.
    pub keep_staging: bool,
}

/// Outcome of processing one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryReport {
    pub library: String,
    pub manifest: Manifest,
    pub stats: ReconcileStats,
}

/// Locate the staging root. A missing root is fatal.
pub fn resolve_staging_root(repo_root: &Path, staging_dir: Option<&Path>) -> Result<PathBuf> {
    let root = match staging_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => repo_root.join(dir),
        None => default_staging_root(repo_root),
    };
    if !root.is_dir() {
        return Err(Error::StagingRootMissing { path: root });
    }
    Ok(root)
}

/// List the staged libraries, optionally restricted to `only`.
pub fn resolve_libraries(staging_root: &Path, only: Option<&str>) -> Result<Vec<String>> {
    let libraries: Vec<String> = filesystem::list_children(staging_root)?
        .into_iter()
        .filter(|name| {
            std::fs::symlink_metadata(staging_root.join(name))
                .map(|m| m.is_dir())
                .unwrap_or(false)
        })
        .collect();

    match only {
        Some(name) if libraries.iter().any(|l| l == name) => Ok(vec![name.to_string()]),
        Some(name) => Err(Error::StagingRootMissing {
            path: staging_root.join(name),
        }),
        None => Ok(libraries),
    }
}

/// Locate the destination directory of a library, creating it for new libraries.
pub fn resolve_destination_root(repo_root: &Path, library: &str) -> Result<PathBuf> {
    let destination = repo_root.join(library);
    match std::fs::symlink_metadata(&destination) {
        Ok(metadata) if metadata.is_dir() => Ok(destination),
        Ok(_) => Err(Error::DestinationRootMissing { path: destination }),
        Err(_) => {
            log::info!("Creating new library directory {}", destination.display());
            filesystem::mkdir(&destination)?;
            Ok(destination)
        }
    }
}

/// Process every staged library under the repository.
pub fn run(options: &RunOptions) -> Result<Vec<LibraryReport>> {
    let staging_root = resolve_staging_root(&options.repo_root, options.staging_dir.as_deref())?;
    let libraries = resolve_libraries(&staging_root, options.library.as_deref())?;
    if libraries.is_empty() {
        log::warn!("Nothing staged in {}", staging_root.display());
    }

    let mut reports = Vec::with_capacity(libraries.len());
    for library in libraries {
        let staged = staging_root.join(&library);
        let destination = resolve_destination_root(&options.repo_root, &library)?;
        let report = process_library(&library, &staged, &destination)?;

        if !options.keep_staging {
            filesystem::remove_recursive(&staged)?;
            log::debug!("Consumed staged tree {}", staged.display());
        }
        reports.push(report);
    }

    if !options.keep_staging && filesystem::list_children(&staging_root)?.is_empty() {
        filesystem::remove_empty_dir(&staging_root)?;
        log::debug!("Removed empty staging root {}", staging_root.display());
    }
    Ok(reports)
}

/// Merge one staged library into its destination and persist the manifest.
pub fn process_library(library: &str, staged: &Path, destination: &Path) -> Result<LibraryReport> {
    log::info!("Processing {}", library);
    let steps = config::from_file(&destination.join(CUSTOMIZATION_FILE_NAME))?.unwrap_or_default();

    let mut context = ReconciliationContext::new(staged, destination)?
        .with_manifest_from_disk()
        .with_pipeline(ModifierPipeline::with_defaults()?)
        .with_ignore(GitCheckIgnore::new(destination));

    execute_steps(&mut context, &steps)?;
    let manifest = context.save_manifest()?;

    Ok(LibraryReport {
        library: library.to_string(),
        manifest,
        stats: context.stats(),
    })
}

/// Execute customization steps, then the merge if no step ran it.
pub fn execute_steps(context: &mut ReconciliationContext, steps: &[Step]) -> Result<()> {
    let mut edited = false;
    for step in steps {
        log::debug!("Executing {} step", step.kind());
        apply_step(context, step, &mut edited)?;
    }

    if !context.is_reconciled() {
        context.reconcile()?;
    }
    if edited {
        log::info!("Recomputing manifest after customization edits");
        context.recompute_manifest()?;
    }
    Ok(())
}

fn apply_step(context: &mut ReconciliationContext, step: &Step, edited: &mut bool) -> Result<()> {
    match step {
        Step::RemoveModifiers { remove_modifiers } => {
            let pipeline = context.pipeline_mut();
            for name in &remove_modifiers.names {
                if pipeline.remove_named(name) == 0 {
                    log::warn!("No modifier named {} to remove", name);
                }
            }
            for pattern in &remove_modifiers.patterns {
                let regex = Regex::new(pattern)?;
                if pipeline.remove_matching(&regex) == 0 {
                    log::warn!("No modifier matching {} to remove", pattern);
                }
            }
        }
        Step::ClearModifiers { clear_modifiers } => {
            if *clear_modifiers {
                context.pipeline_mut().clear();
            }
        }
        Step::PreventOverwrite { prevent_overwrite } => {
            let name = prevent_overwrite.name.as_deref().unwrap_or("prevent_overwrite");
            let modifier = builtin::prevent_overwrite_of_existing(globs(&prevent_overwrite.paths)?, name);
            context.pipeline_mut().push(modifier);
        }
        Step::PreserveJsonFields { preserve_json_fields } => {
            let op = preserve_json_fields;
            let name = op.name.as_deref().unwrap_or("preserve_json_fields");
            let modifier = builtin::preserve_json_fields(globs(&op.paths)?, &op.fields, name)?;
            context.pipeline_mut().push(modifier);
        }
        Step::Replace { replace } => {
            let name = replace.name.as_deref().unwrap_or("replace");
            let modifier = builtin::replace_text(globs(&replace.paths)?, &replace.pattern, &replace.replacement, name)?;
            context.pipeline_mut().push(modifier);
        }
        Step::Omit { omit } => {
            let name = omit.name.as_deref().unwrap_or("omit");
            context.pipeline_mut().push(builtin::omit(globs(&omit.paths)?, name));
        }
        Step::Merge { .. } => context.reconcile()?,
        Step::Move { r#move } => {
            let root = context.destination_root().to_path_buf();
            filesystem::move_path(&root.join(&r#move.from), &root.join(&r#move.to))?;
            log::info!("Moved {} to {}", r#move.from, r#move.to);
            *edited = true;
        }
        Step::Delete { delete } => {
            let root = context.destination_root().to_path_buf();
            let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
            for pattern in &delete.paths {
                let matches = glob::glob(&format!("{}/{}", escaped_root, pattern))?
                    .collect::<std::result::Result<Vec<PathBuf>, _>>()
                    .map_err(|e| Error::Filesystem {
                        message: format!("Failed to expand '{}': {}", pattern, e),
                    })?;
                if matches.is_empty() {
                    log::warn!("Nothing matched delete pattern {}", pattern);
                }
                for path in matches {
                    filesystem::remove_recursive(&path)?;
                    log::info!("Deleted {}", path.strip_prefix(&root).unwrap_or(&path).display());
                }
            }
            *edited = true;
        }
    }
    Ok(())
}

/// Recompute and save the manifest of a library without a staged tree.
///
/// Used after manual edits: listed paths that disappeared are dropped and
/// new files are recorded as static.
pub fn update_manifest(destination_root: &Path) -> Result<Manifest> {
    if !destination_root.is_dir() {
        return Err(Error::DestinationRootMissing {
            path: destination_root.to_path_buf(),
        });
    }
    let manifest_path = destination_root.join(MANIFEST_FILE_NAME);
    let mut next = Manifest::load(&manifest_path).to_builder();
    let ignore = GitCheckIgnore::new(destination_root);
    manifest::recompute_from_tree(destination_root, MANIFEST_FILE_NAME, &ignore, &mut next)?;

    let manifest = next.finalize();
    manifest.save(&manifest_path)?;
    Ok(manifest)
}
