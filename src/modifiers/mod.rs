//! Content modifiers applied while merging files
//!
//! A [`Modifier`] is a named, path-filtered transform with the signature
//! `(staged?, destination?, path) -> content?`. The [`ModifierPipeline`] folds
//! every matching modifier over a file's staged content, in registration
//! order, and hands the result to the reconciliation engine:
//!
//! - `Some(bytes)` is what the destination file should contain.
//! - `None` means the file should not exist: an existing destination file is
//!   deleted and a new one is never created.
//!
//! The destination content is passed unchanged to every modifier so
//! preservation-style modifiers can copy values out of the old file.
//!
//! Built-in modifiers and the helpers used by customization files live in
//! [`builtin`].

pub mod builtin;

use crate::error::Result;
use glob::Pattern;
use regex::Regex;
use std::fmt;

/// The transform function of a modifier.
pub type Transform = Box<dyn Fn(Option<&[u8]>, Option<&[u8]>, &str) -> Option<Vec<u8>>>;

/// Selects the paths a modifier applies to.
#[derive(Debug, Clone)]
pub enum PathFilter {
    /// Glob over the relative path; `*` also matches `/`.
    Glob(Pattern),
    /// Regex searched anywhere in the relative path.
    Regex(Regex),
}

impl PathFilter {
    pub fn glob(pattern: &str) -> Result<Self> {
        Ok(PathFilter::Glob(Pattern::new(pattern)?))
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(PathFilter::Regex(Regex::new(pattern)?))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathFilter::Glob(pattern) => pattern.matches(path),
            PathFilter::Regex(regex) => regex.is_match(path),
        }
    }
}

/// Compile a list of glob patterns into filters.
pub fn globs<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathFilter>> {
    patterns.iter().map(|p| PathFilter::glob(p.as_ref())).collect()
}

/// A named, path-filtered content transform.
pub struct Modifier {
    name: String,
    filters: Vec<PathFilter>,
    transform: Transform,
    retains_destination: bool,
}

impl Modifier {
    /// Create a modifier. An empty filter list matches every path.
    pub fn new<F>(name: impl Into<String>, filters: Vec<PathFilter>, transform: F) -> Self
    where
        F: Fn(Option<&[u8]>, Option<&[u8]>, &str) -> Option<Vec<u8>> + 'static,
    {
        Self {
            name: name.into(),
            filters,
            transform: Box::new(transform),
            retains_destination: false,
        }
    }

    /// Mark this modifier as one that keeps existing destination content.
    ///
    /// When such a modifier yields exactly the destination's bytes, the file
    /// is recorded as static rather than generated.
    pub fn retaining_destination(mut self) -> Self {
        self.retains_destination = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retains_destination(&self) -> bool {
        self.retains_destination
    }

    pub fn matches(&self, path: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(path))
    }

    pub fn call(&self, staged: Option<&[u8]>, destination: Option<&[u8]>, path: &str) -> Option<Vec<u8>> {
        (self.transform)(staged, destination, path)
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            "(anonymous)"
        } else {
            &self.name
        }
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("name", &self.name)
            .field("filters", &self.filters)
            .field("retains_destination", &self.retains_destination)
            .finish_non_exhaustive()
    }
}

/// Result of running the pipeline over one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Final content, or `None` when the file should not exist.
    pub content: Option<Vec<u8>>,
    /// A destination-retaining modifier settled the content.
    pub retained_destination: bool,
}

/// An ordered list of modifiers.
#[derive(Debug, Default)]
pub struct ModifierPipeline {
    modifiers: Vec<Modifier>,
}

impl ModifierPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline holding the built-in default modifiers.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            modifiers: builtin::default_modifiers()?,
        })
    }

    /// Append a modifier built from its parts.
    pub fn register<F>(&mut self, filters: Vec<PathFilter>, name: impl Into<String>, transform: F)
    where
        F: Fn(Option<&[u8]>, Option<&[u8]>, &str) -> Option<Vec<u8>> + 'static,
    {
        self.push(Modifier::new(name, filters, transform));
    }

    /// Append a modifier.
    pub fn push(&mut self, modifier: Modifier) {
        log::debug!("Registered modifier {}", modifier.label());
        self.modifiers.push(modifier);
    }

    /// Remove modifiers whose name equals `name`. Returns how many were removed.
    pub fn remove_named(&mut self, name: &str) -> usize {
        self.remove_where(|m| m.name == name)
    }

    /// Remove modifiers whose name matches `pattern`. Returns how many were removed.
    pub fn remove_matching(&mut self, pattern: &Regex) -> usize {
        self.remove_where(|m| pattern.is_match(&m.name))
    }

    fn remove_where(&mut self, predicate: impl Fn(&Modifier) -> bool) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| {
            let remove = predicate(m);
            if remove {
                log::debug!("Removed modifier {}", m.label());
            }
            !remove
        });
        before - self.modifiers.len()
    }

    /// Remove every modifier.
    pub fn clear(&mut self) {
        self.modifiers.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.modifiers.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Fold the matching modifiers over `staged`, returning the final content.
    pub fn apply(&self, path: &str, staged: Option<&[u8]>, destination: Option<&[u8]>) -> Option<Vec<u8>> {
        self.run(path, staged, destination).content
    }

    /// Like [`apply`](Self::apply), also reporting whether a
    /// destination-retaining modifier decided the outcome.
    pub fn run(&self, path: &str, staged: Option<&[u8]>, destination: Option<&[u8]>) -> PipelineOutput {
        let mut current = staged.map(<[u8]>::to_vec);
        let mut retained_destination = false;

        for modifier in self.modifiers.iter().filter(|m| m.matches(path)) {
            let output = modifier.call(current.as_deref(), destination, path);
            let changed = output != current;

            if changed {
                // Only replacing different bytes with the destination's counts as retention.
                retained_destination =
                    modifier.retains_destination && destination.is_some() && output.as_deref() == destination;
                match output {
                    Some(_) => log::debug!("Modifier {} changed {}", modifier.label(), path),
                    None => log::debug!("Modifier {} omitted {}", modifier.label(), path),
                }
            }
            current = output;
        }

        PipelineOutput {
            content: current,
            retained_destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(staged: Option<&[u8]>, _dest: Option<&[u8]>, _path: &str) -> Option<Vec<u8>> {
        staged.map(|s| s.to_ascii_uppercase())
    }

    fn suffixed(content: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut out = content.to_vec();
        out.extend_from_slice(suffix);
        out
    }

    #[test]
    fn test_empty_pipeline_passes_through() {
        let pipeline = ModifierPipeline::new();
        assert_eq!(pipeline.apply("a.txt", Some(b"x"), None), Some(b"x".to_vec()));
        assert_eq!(pipeline.apply("a.txt", None, Some(b"y")), None);
    }

    #[test]
    fn test_filters() {
        let filter = PathFilter::glob("lib/*.rb").unwrap();
        assert!(filter.matches("lib/a.rb"));
        assert!(!filter.matches("a.rb"));

        let filter = PathFilter::regex(r"\.gemspec$").unwrap();
        assert!(filter.matches("google-cloud-foo.gemspec"));
        assert!(!filter.matches("Gemfile"));

        assert!(PathFilter::regex("(").is_err());
    }

    #[test]
    fn test_modifiers_apply_in_order() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(vec![], "append", |staged, _, _| staged.map(|s| suffixed(s, b"!")));
        pipeline.register(vec![], "upper", upper);

        assert_eq!(pipeline.apply("x", Some(b"hi"), None), Some(b"HI!".to_vec()));
    }

    #[test]
    fn test_filtered_modifier_skips_other_paths() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(globs(&["*.rb"]).unwrap(), "upper", upper);

        assert_eq!(pipeline.apply("a.rb", Some(b"x"), None), Some(b"X".to_vec()));
        assert_eq!(pipeline.apply("a.md", Some(b"x"), None), Some(b"x".to_vec()));
    }

    #[test]
    fn test_destination_is_passed_unchanged() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(vec![], "first", |_, dest, _| dest.map(|d| suffixed(d, b"1")));
        pipeline.register(vec![], "second", |staged, dest, _| {
            assert_eq!(dest, Some(&b"old"[..]));
            staged.map(|s| suffixed(s, b"2"))
        });

        assert_eq!(pipeline.apply("x", Some(b"new"), Some(b"old")), Some(b"old12".to_vec()));
    }

    #[test]
    fn test_veto_then_later_modifiers_see_none() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(vec![], "veto", |_, _, _| None);
        pipeline.register(vec![], "upper", upper);

        assert_eq!(pipeline.apply("x", Some(b"x"), None), None);
    }

    #[test]
    fn test_remove_named_and_matching() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.register(vec![], "keep", upper);
        pipeline.register(vec![], "drop_me", upper);
        pipeline.register(vec![], "drop_me_too", upper);

        assert_eq!(pipeline.remove_named("drop_me"), 1);
        assert_eq!(pipeline.names(), vec!["keep", "drop_me_too"]);

        assert_eq!(pipeline.remove_matching(&Regex::new("^drop").unwrap()), 1);
        assert_eq!(pipeline.names(), vec!["keep"]);

        pipeline.clear();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_retained_destination_tracking() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.push(
            Modifier::new("keep_old", vec![], |staged, dest, _| dest.or(staged).map(<[u8]>::to_vec))
                .retaining_destination(),
        );

        let output = pipeline.run("CHANGELOG.md", Some(b"new"), Some(b"old"));
        assert_eq!(output.content, Some(b"old".to_vec()));
        assert!(output.retained_destination);

        let output = pipeline.run("CHANGELOG.md", Some(b"new"), None);
        assert_eq!(output.content, Some(b"new".to_vec()));
        assert!(!output.retained_destination);

        let output = pipeline.run("CHANGELOG.md", Some(b"same"), Some(b"same"));
        assert_eq!(output.content, Some(b"same".to_vec()));
        assert!(!output.retained_destination);
    }

    #[test]
    fn test_later_change_clears_retention() {
        let mut pipeline = ModifierPipeline::new();
        pipeline.push(
            Modifier::new("keep_old", vec![], |_, dest, _| dest.map(<[u8]>::to_vec)).retaining_destination(),
        );
        pipeline.register(vec![], "upper", upper);

        let output = pipeline.run("x", Some(b"new"), Some(b"old"));
        assert_eq!(output.content, Some(b"OLD".to_vec()));
        assert!(!output.retained_destination);
    }

    #[test]
    fn test_debug_hides_transform() {
        let modifier = Modifier::new("", vec![], upper);
        let debug = format!("{:?}", modifier);
        assert!(debug.contains("Modifier"));
        assert_eq!(modifier.label(), "(anonymous)");
    }
}
