//! Update-manifest command implementation
//!
//! Recomputes a library's `.owlbot-manifest.json` after manual edits,
//! without a staged tree.

use anyhow::{Context, Result};
use clap::Args;
use owlbot::orchestrator;
use std::path::PathBuf;

/// Arguments for the update-manifest command
#[derive(Args, Debug)]
pub struct UpdateManifestArgs {
    /// Library directory name under the repository root
    #[arg(value_name = "LIBRARY")]
    pub library: String,

    /// Repository root (defaults to current directory)
    #[arg(long, value_name = "PATH", env = "OWLBOT_REPO_ROOT")]
    pub repo_root: Option<PathBuf>,
}

/// Execute the update-manifest command
pub fn execute(args: UpdateManifestArgs) -> Result<()> {
    let repo_root = match args.repo_root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let destination = repo_root.join(&args.library);
    let manifest = orchestrator::update_manifest(&destination)
        .with_context(|| format!("Failed to update manifest of {}", args.library))?;

    println!(
        "{}: {} generated, {} static",
        args.library,
        manifest.generated.len(),
        manifest.static_files.len()
    );
    Ok(())
}
