//! # CLI Command Implementations
//!
//! Each subcommand of `owlbot-postprocessor` lives in its own file with:
//! - an `Args` struct derived with `clap`,
//! - an `execute` function that resolves defaults and calls into the
//!   `owlbot` library.

pub mod run;
pub mod update_manifest;
