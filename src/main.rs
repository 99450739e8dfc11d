//! # OwlBot Postprocessor CLI
//!
//! This is the binary entry point for the `owlbot-postprocessor` tool.
//!
//! Its responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the selected command.
//! - Reporting top-level errors with a non-zero exit status.
//!
//! The merge itself lives in the `owlbot` library crate; the binary is a thin
//! wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
