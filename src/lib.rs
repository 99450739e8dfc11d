//! # OwlBot Postprocessor Library
//!
//! This library merges freshly generated client library code, staged in a
//! scratch directory, into the checked-in library directories of a
//! repository. It keeps track of which files the generator owns so that
//! files removed from the generator output are also removed from the
//! repository, while hand-written files are left alone.
//!
//! ## Quick Example
//!
//! ```no_run
//! use owlbot::modifiers::ModifierPipeline;
//! use owlbot::reconcile::ReconciliationContext;
//!
//! let mut context = ReconciliationContext::new("owl-bot-staging/google-cloud-foo", "google-cloud-foo")?
//!     .with_manifest_from_disk()
//!     .with_pipeline(ModifierPipeline::with_defaults()?);
//! context.reconcile()?;
//! let manifest = context.save_manifest()?;
//! println!("{} generated files", manifest.generated.len());
//! # Ok::<(), owlbot::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Paths (`path`)**: A lazily evaluated view of one relative path in both
//!   the staged and the destination tree.
//! - **Manifest (`manifest`)**: The `.owlbot-manifest.json` record of
//!   generated and static files, used to decide what may be deleted.
//! - **Modifiers (`modifiers`)**: Ordered, path-filtered content transforms
//!   applied to staged files before they are written.
//! - **Reconciliation (`reconcile`)**: The three-way merge of staged tree,
//!   destination tree and previous manifest.
//! - **Customization (`config`)**: The per-library `.owlbot.yaml` steps.
//! - **Orchestration (`orchestrator`)**: Staging discovery, customization
//!   execution, manifest persistence and staging cleanup.

pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod manifest;
pub mod modifiers;
pub mod orchestrator;
pub mod path;
pub mod reconcile;

#[cfg(test)]
mod manifest_proptest;
