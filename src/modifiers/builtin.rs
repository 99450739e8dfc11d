//! Built-in modifiers
//!
//! The default pipeline keeps hand-maintained details of a library intact
//! across regenerations:
//!
//! - copyright years already present in source and build files,
//! - release metadata fields in `.repo-metadata.json`,
//! - the changelog and version file, which are owned by the release process.
//!
//! The constructors here are also what `.owlbot.yaml` steps build on.

use super::{globs, Modifier, PathFilter};
use crate::error::{Error, Result};
use regex::bytes::Regex;

pub const PRESERVE_COPYRIGHT_YEARS: &str = "preserve_existing_copyright_years";
pub const PRESERVE_REPO_METADATA: &str = "preserve_repo_metadata_fields";
pub const PREVENT_OVERWRITE_CHANGELOG: &str = "prevent_overwrite_of_existing_changelog";
pub const PREVENT_OVERWRITE_VERSION: &str = "prevent_overwrite_of_existing_version";

const COPYRIGHT_PATHS: &[&str] = &["*.rb", "*.gemspec", "Gemfile", "*/Gemfile", "Rakefile", "*/Rakefile"];
const REPO_METADATA_PATHS: &[&str] = &[".repo-metadata.json"];
const REPO_METADATA_FIELDS: &[&str] = &["release_level", "library_version"];
const CHANGELOG_PATHS: &[&str] = &["CHANGELOG.md"];
const VERSION_PATHS: &[&str] = &["lib/**/version.rb"];

/// A quoted JSON string, number, boolean or null.
const JSON_SCALAR: &str = r#""(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null"#;

/// The modifiers installed before every run.
pub fn default_modifiers() -> Result<Vec<Modifier>> {
    let fields: Vec<String> = REPO_METADATA_FIELDS.iter().map(|f| f.to_string()).collect();
    Ok(vec![
        preserve_copyright_years(globs(COPYRIGHT_PATHS)?, PRESERVE_COPYRIGHT_YEARS)?,
        preserve_json_fields(globs(REPO_METADATA_PATHS)?, &fields, PRESERVE_REPO_METADATA)?,
        prevent_overwrite_of_existing(globs(CHANGELOG_PATHS)?, PREVENT_OVERWRITE_CHANGELOG),
        prevent_overwrite_of_existing(globs(VERSION_PATHS)?, PREVENT_OVERWRITE_VERSION),
    ])
}

/// Rewrite the staged `# Copyright <YEAR>` line to the destination's year.
pub fn preserve_copyright_years(filters: Vec<PathFilter>, name: &str) -> Result<Modifier> {
    let regex = Regex::new(r"(?m)^#\s*Copyright\s+(\d{4})\b")?;
    Ok(Modifier::new(name, filters, move |staged, destination, _path| {
        let staged = staged?;
        let destination = match destination {
            Some(destination) => destination,
            None => return Some(staged.to_vec()),
        };
        Some(replace_first_capture(&regex, staged, destination).unwrap_or_else(|| staged.to_vec()))
    }))
}

/// Copy literal values of `fields` from the destination JSON into the staged JSON.
///
/// This is a targeted text substitution: the rest of the staged document
/// keeps its formatting and key order.
pub fn preserve_json_fields(filters: Vec<PathFilter>, fields: &[String], name: &str) -> Result<Modifier> {
    let regexes = fields
        .iter()
        .map(|field| {
            let pattern = format!(r#""{}"\s*:\s*({})"#, regex::escape(field), JSON_SCALAR);
            Regex::new(&pattern).map_err(|e| Error::Modifier {
                modifier: name.to_string(),
                message: format!("invalid field '{}': {}", field, e),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Modifier::new(name, filters, move |staged, destination, _path| {
        let staged = staged?;
        let destination = match destination {
            Some(destination) => destination,
            None => return Some(staged.to_vec()),
        };
        let mut content = staged.to_vec();
        for regex in &regexes {
            if let Some(replaced) = replace_first_capture(regex, &content, destination) {
                content = replaced;
            }
        }
        Some(content)
    }))
}

/// Keep an existing destination file verbatim, whatever was staged.
///
/// Without staged content the result is `None`, so a file the generator
/// stopped producing is still deleted.
pub fn prevent_overwrite_of_existing(filters: Vec<PathFilter>, name: &str) -> Modifier {
    Modifier::new(name, filters, |staged, destination, _path| {
        staged.map(|s| destination.unwrap_or(s).to_vec())
    })
    .retaining_destination()
}

/// Replace every match of `pattern` in the staged content with `replacement`.
///
/// `replacement` may refer to capture groups as `$1` or `${name}`.
pub fn replace_text(filters: Vec<PathFilter>, pattern: &str, replacement: &str, name: &str) -> Result<Modifier> {
    let regex = Regex::new(pattern).map_err(|e| Error::Modifier {
        modifier: name.to_string(),
        message: e.to_string(),
    })?;
    let replacement = replacement.as_bytes().to_vec();
    Ok(Modifier::new(name, filters, move |staged, _destination, _path| {
        staged.map(|s| regex.replace_all(s, replacement.as_slice()).into_owned())
    }))
}

/// Never create matching files, and delete existing ones.
pub fn omit(filters: Vec<PathFilter>, name: &str) -> Modifier {
    Modifier::new(name, filters, |_staged, _destination, _path| None)
}

/// Replace the first capture group of `regex` in `target` with the first
/// capture group's text from `source`. `None` when either side lacks a match
/// or nothing would change.
fn replace_first_capture(regex: &Regex, target: &[u8], source: &[u8]) -> Option<Vec<u8>> {
    let wanted = regex.captures(source)?.get(1)?.as_bytes();
    let current = regex.captures(target)?.get(1)?;
    if current.as_bytes() == wanted {
        return None;
    }
    let mut out = Vec::with_capacity(target.len() + wanted.len());
    out.extend_from_slice(&target[..current.start()]);
    out.extend_from_slice(wanted);
    out.extend_from_slice(&target[current.end()..]);
    Some(out)
}
