//! Run command implementation
//!
//! Merges every library staged under the staging directory into the
//! repository, then consumes the staged trees.

use anyhow::{Context, Result};
use clap::Args;
use owlbot::orchestrator::{self, RunOptions};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository root (defaults to current directory)
    #[arg(long, value_name = "PATH", env = "OWLBOT_REPO_ROOT")]
    pub repo_root: Option<PathBuf>,

    /// Staging directory, relative to the repository root unless absolute
    #[arg(long, value_name = "PATH", env = "OWLBOT_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Only process this staged library
    #[arg(long, value_name = "NAME", env = "OWLBOT_LIBRARY")]
    pub library: Option<String>,

    /// Leave staged directories in place after merging
    #[arg(long)]
    pub keep_staging: bool,

    /// Suppress the summary output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let start_time = Instant::now();
    let repo_root = match args.repo_root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let options = RunOptions {
        repo_root,
        staging_dir: args.staging_dir,
        library: args.library,
        keep_staging: args.keep_staging,
    };
    let reports = orchestrator::run(&options).map_err(|err| {
        let message = if err.is_structural() {
            "Run aborted before merging"
        } else {
            "Run failed; the destination may be partially merged"
        };
        anyhow::Error::new(err).context(message)
    })?;

    if !args.quiet {
        for report in &reports {
            let stats = report.stats;
            println!(
                "{}: {} written, {} unchanged, {} deleted, {} kept, {} vetoed",
                report.library, stats.written, stats.unchanged, stats.deleted, stats.kept, stats.vetoed
            );
        }
        println!(
            "Processed {} libraries in {:.2}s",
            reports.len(),
            start_time.elapsed().as_secs_f64()
        );
    }
    Ok(())
}
