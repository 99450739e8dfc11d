//! # Error Handling
//!
//! This module defines the centralized error type for the postprocessor.
//! It uses the `thiserror` library to create an `Error` enum that covers
//! every failure the library can surface to a caller.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into two groups:
//!   - *Structural* failures that abort a whole run: a missing staging root,
//!     a missing destination root, or a context that has already been
//!     reconciled. The `run` command checks [`Error::is_structural`] to
//!     report these as an aborted run rather than a partial merge.
//!   - Everything else: filesystem primitives, customization parsing,
//!     modifier construction and the wrapped library errors.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Per-path anomalies met during a merge (type conflicts, overwriting a
//! gitignored or static file) are never errors; they are logged as
//! warnings by the reconciliation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for postprocessor operations
#[derive(Error, Debug)]
pub enum Error {
    /// The staging root (or a requested library inside it) does not exist.
    #[error("Staging root not found: {}", path.display())]
    StagingRootMissing { path: PathBuf },

    /// The destination library directory does not exist.
    #[error("Destination root not found: {}", path.display())]
    DestinationRootMissing { path: PathBuf },

    /// A reconciliation context was asked to merge a second time.
    #[error("Staged tree already reconciled: {}", path.display())]
    AlreadyReconciled { path: PathBuf },

    /// An error occurred with a raw filesystem primitive.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// The `.owlbot.yaml` customization file could not be used.
    ///
    /// Includes an optional hint about how to fix it.
    #[error("Customization error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Customization {
        message: String,
        /// Optional hint for how to fix the customization file
        hint: Option<String>,
    },

    /// A modifier could not be built from its description.
    #[error("Modifier error: {modifier} - {message}")]
    Modifier { modifier: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Whether this error is one of the structural failures that abort a run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::StagingRootMissing { .. }
                | Error::DestinationRootMissing { .. }
                | Error::AlreadyReconciled { .. }
        )
    }

    pub(crate) fn filesystem(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        Error::Filesystem {
            message: format!("Failed to {} '{}': {}", action, path.display(), err),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
