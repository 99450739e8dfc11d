//! Path views over the staged and destination trees
//!
//! A [`PathView`] names one relative path (the root is `""`) and answers
//! questions about the object found at that path on both sides of a merge.
//! Every fact is read lazily and memoized for the lifetime of the view, so a
//! single classification decision always sees a consistent picture even if
//! the engine later writes to the destination side.
//!
//! Missing or unreadable objects are reported as [`EntryKind::Absent`] or
//! `None`; a view never returns an error.

use crate::error::{Error, Result};
use crate::filesystem;
use glob::Pattern;
use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Match a relative path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(path))
}

/// Join a relative path and a child name with `/`.
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// The type of filesystem object found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Absent,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
            EntryKind::Absent => "nothing",
        };
        f.write_str(name)
    }
}

/// Memoized facts about one side of a path.
#[derive(Debug, Default)]
struct Side {
    kind: OnceCell<EntryKind>,
    content: OnceCell<Option<Vec<u8>>>,
    target: OnceCell<Option<PathBuf>>,
    children: OnceCell<Vec<String>>,
}

impl Side {
    fn kind(&self, path: &Path) -> EntryKind {
        *self.kind.get_or_init(|| match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.file_type().is_symlink() => EntryKind::Symlink,
            Ok(metadata) if metadata.is_dir() => EntryKind::Directory,
            Ok(_) => EntryKind::File,
            Err(e) if e.kind() == ErrorKind::NotFound => EntryKind::Absent,
            Err(e) => {
                log::warn!("Cannot inspect {}: {}", path.display(), e);
                EntryKind::Absent
            }
        })
    }

    fn content(&self, path: &Path) -> Option<&[u8]> {
        self.content
            .get_or_init(|| {
                if self.kind(path) != EntryKind::File {
                    return None;
                }
                match fs::read(path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        log::warn!("Cannot read {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .as_deref()
    }

    fn target(&self, path: &Path) -> Option<&Path> {
        self.target
            .get_or_init(|| {
                if self.kind(path) != EntryKind::Symlink {
                    return None;
                }
                filesystem::read_symlink_target(path)
                    .map_err(|e| log::warn!("{}", e))
                    .ok()
            })
            .as_deref()
    }

    fn children(&self, path: &Path) -> &[String] {
        self.children.get_or_init(|| {
            if self.kind(path) != EntryKind::Directory {
                return Vec::new();
            }
            filesystem::list_children(path).unwrap_or_else(|e| {
                log::warn!("{}", e);
                Vec::new()
            })
        })
    }
}

/// A read-only view of one relative path in both trees.
#[derive(Debug)]
pub struct PathView<'a> {
    staged_root: &'a Path,
    destination_root: &'a Path,
    relative: String,
    staged: Side,
    destination: Side,
}

impl<'a> PathView<'a> {
    /// View of the roots themselves.
    pub fn root(staged_root: &'a Path, destination_root: &'a Path) -> Self {
        Self::new(staged_root, destination_root, String::new())
    }

    fn new(staged_root: &'a Path, destination_root: &'a Path, relative: String) -> Self {
        Self {
            staged_root,
            destination_root,
            relative,
            staged: Side::default(),
            destination: Side::default(),
        }
    }

    /// View of a child entry of this path.
    pub fn child(&self, name: &str) -> PathView<'a> {
        Self::new(
            self.staged_root,
            self.destination_root,
            join_relative(&self.relative, name),
        )
    }

    /// The `/`-separated path relative to both roots; empty for the root.
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Absolute path of this entry in the staged tree.
    pub fn staged_path(&self) -> PathBuf {
        if self.is_root() {
            self.staged_root.to_path_buf()
        } else {
            self.staged_root.join(&self.relative)
        }
    }

    /// Absolute path of this entry in the destination tree.
    pub fn destination_path(&self) -> PathBuf {
        if self.is_root() {
            self.destination_root.to_path_buf()
        } else {
            self.destination_root.join(&self.relative)
        }
    }

    pub fn staged_kind(&self) -> EntryKind {
        self.staged.kind(&self.staged_path())
    }

    pub fn destination_kind(&self) -> EntryKind {
        self.destination.kind(&self.destination_path())
    }

    pub fn exists_in_staged(&self) -> bool {
        self.staged_kind() != EntryKind::Absent
    }

    pub fn exists_in_destination(&self) -> bool {
        self.destination_kind() != EntryKind::Absent
    }

    /// Bytes of the staged file, if the staged object is a regular file.
    pub fn staged_content(&self) -> Option<&[u8]> {
        self.staged.content(&self.staged_path())
    }

    /// Bytes of the destination file, if the destination object is a regular file.
    pub fn destination_content(&self) -> Option<&[u8]> {
        self.destination.content(&self.destination_path())
    }

    pub fn staged_symlink_target(&self) -> Option<&Path> {
        self.staged.target(&self.staged_path())
    }

    pub fn destination_symlink_target(&self) -> Option<&Path> {
        self.destination.target(&self.destination_path())
    }

    /// Sorted child names in the staged tree; empty unless a directory.
    pub fn staged_children(&self) -> &[String] {
        self.staged.children(&self.staged_path())
    }

    /// Sorted child names in the destination tree; empty unless a directory.
    pub fn destination_children(&self) -> &[String] {
        self.destination.children(&self.destination_path())
    }
}

impl PartialEq for PathView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative
    }
}

impl Eq for PathView<'_> {}

impl Hash for PathView<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative.hash(state);
    }
}

impl fmt::Display for PathView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.relative)
        }
    }
}
