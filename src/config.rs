//! # Customization File Schema and Parsing
//!
//! A library can carry a `.owlbot.yaml` file at its root to adjust how its
//! staged tree is merged. The file is a list of steps executed in order:
//!
//! ```yaml
//! - remove_modifiers:
//!     names: ["preserve_existing_copyright_years"]
//! - prevent_overwrite:
//!     paths: ["README.md"]
//! - replace:
//!     paths: ["lib/**/*.rb"]
//!     pattern: "Google::Cloud::Foo::V1beta"
//!     replacement: "Google::Cloud::Foo::V1"
//! - merge: {}
//! - move:
//!     from: "lib/old_name.rb"
//!     to: "lib/new_name.rb"
//! ```
//!
//! ## Step kinds
//!
//! - **Pipeline steps** (`remove_modifiers`, `clear_modifiers`,
//!   `prevent_overwrite`, `preserve_json_fields`, `replace`, `omit`) change the
//!   modifier pipeline and must come before the merge.
//! - **`merge`** runs the reconciliation. Without one, the merge runs after
//!   all steps.
//! - **File steps** (`move`, `delete`) edit the merged destination tree and
//!   must come after an explicit `merge`. The manifest is recomputed after
//!   them.
//!
//! Each step is a single-key mapping, parsed with an untagged enum the same
//! way for every step kind.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path};

const KNOWN_STEPS: &str = "remove_modifiers, clear_modifiers, prevent_overwrite, \
preserve_json_fields, replace, omit, merge, move, delete";

/// remove_modifiers step configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveModifiersOp {
    /// Exact modifier names to remove.
    #[serde(default)]
    pub names: Vec<String>,
    /// Regular expressions matched against modifier names.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Configuration shared by steps that only select paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsOp {
    /// Glob patterns over paths relative to the library root.
    pub paths: Vec<String>,
    /// Optional modifier name, so later steps can remove it.
    #[serde(default)]
    pub name: Option<String>,
}

/// preserve_json_fields step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreserveJsonFieldsOp {
    /// Glob patterns selecting the JSON files.
    pub paths: Vec<String>,
    /// Field names whose existing values are kept.
    pub fields: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// replace step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOp {
    /// Glob patterns selecting files; empty means every file.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Regular expression to search for.
    pub pattern: String,
    /// Replacement text; `$1` and `${name}` refer to capture groups.
    pub replacement: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// merge step configuration (no options)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOp {}

/// move step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOp {
    pub from: String,
    pub to: String,
}

/// delete step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub paths: Vec<String>,
}

/// All possible customization steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Remove modifiers by name or name pattern.
    RemoveModifiers { remove_modifiers: RemoveModifiersOp },
    /// Remove every modifier, including the defaults.
    ClearModifiers { clear_modifiers: bool },
    /// Keep existing destination files verbatim.
    PreventOverwrite { prevent_overwrite: PathsOp },
    /// Keep existing values of JSON fields.
    PreserveJsonFields { preserve_json_fields: PreserveJsonFieldsOp },
    /// Regex substitution on staged content.
    Replace { replace: ReplaceOp },
    /// Never write matching files.
    Omit { omit: PathsOp },
    /// Run the reconciliation now.
    Merge { merge: MergeOp },
    /// Move a path in the merged destination tree.
    Move { r#move: MoveOp },
    /// Delete paths from the merged destination tree.
    Delete { delete: DeleteOp },
}

impl Step {
    /// Short name of the step, as written in the file.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::RemoveModifiers { .. } => "remove_modifiers",
            Step::ClearModifiers { .. } => "clear_modifiers",
            Step::PreventOverwrite { .. } => "prevent_overwrite",
            Step::PreserveJsonFields { .. } => "preserve_json_fields",
            Step::Replace { .. } => "replace",
            Step::Omit { .. } => "omit",
            Step::Merge { .. } => "merge",
            Step::Move { .. } => "move",
            Step::Delete { .. } => "delete",
        }
    }

    /// Whether this step edits the destination tree after the merge.
    pub fn is_file_step(&self) -> bool {
        matches!(self, Step::Move { .. } | Step::Delete { .. })
    }

    /// Whether this step changes the modifier pipeline.
    pub fn is_pipeline_step(&self) -> bool {
        !self.is_file_step() && !matches!(self, Step::Merge { .. })
    }
}

/// A customization file, as a list of steps.
pub type Customization = Vec<Step>;

/// Parses a YAML string into a list of steps.
///
/// Empty documents (including comment-only files) yield no steps.
pub fn parse(yaml_content: &str) -> Result<Customization> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml_content).map_err(|e| Error::Customization {
        message: e.to_string(),
        hint: None,
    })?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    if !value.is_sequence() {
        return Err(Error::Customization {
            message: "Expected a list of steps".to_string(),
            hint: Some("Start each step with '- ', for example '- merge: {}'".to_string()),
        });
    }

    let steps: Customization = serde_yaml::from_value(value).map_err(|e| Error::Customization {
        message: e.to_string(),
        hint: Some(format!("Known steps: {}", KNOWN_STEPS)),
    })?;
    validate(&steps)?;
    Ok(steps)
}

/// Loads a customization file. A missing file is `Ok(None)`.
pub fn from_file(path: &Path) -> Result<Option<Customization>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::filesystem("read customization file", path, e)),
    };
    log::info!("Loading customization {}", path.display());
    parse(&content).map(Some)
}

/// Checks step ordering and file-step paths.
pub fn validate(steps: &[Step]) -> Result<()> {
    let mut merged = false;
    for step in steps {
        match step {
            Step::Merge { .. } => merged = true,
            step if step.is_pipeline_step() && merged => {
                return Err(Error::Customization {
                    message: format!("'{}' step after 'merge' has no effect", step.kind()),
                    hint: Some("Move modifier steps before the merge step".to_string()),
                });
            }
            step if step.is_file_step() && !merged => {
                return Err(Error::Customization {
                    message: format!("'{}' step before 'merge' would edit an unmerged tree", step.kind()),
                    hint: Some("Add a '- merge: {}' step before file steps".to_string()),
                });
            }
            Step::Move { r#move } => {
                check_relative(&r#move.from)?;
                check_relative(&r#move.to)?;
            }
            Step::Delete { delete } => {
                for path in &delete.paths {
                    check_relative(path)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Reject paths that could leave the library root.
fn check_relative(path: &str) -> Result<()> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(Error::Customization {
            message: format!("Path '{}' must be relative to the library root", path),
            hint: None,
        });
    }
    Ok(())
}
