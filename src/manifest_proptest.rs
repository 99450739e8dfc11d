//! Property-based tests for manifests, path helpers and the merge.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all of them.

use crate::manifest::{Manifest, ManifestBuilder};
use crate::modifiers::ModifierPipeline;
use crate::path::{glob_match, join_relative};
use crate::reconcile::ReconciliationContext;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn relative_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|parts| parts.join("/"))
}

/// Files keyed by path such that no path is a prefix directory of another.
fn tree() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(relative_path(), "[a-z ]{0,12}", 0..8).prop_map(|files| {
        let paths: Vec<String> = files.keys().cloned().collect();
        files
            .into_iter()
            .filter(|(path, _)| !paths.iter().any(|other| other.starts_with(&format!("{}/", path))))
            .collect()
    })
}

fn write_tree(root: &Path, files: &BTreeMap<String, String>) {
    for (path, content) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

fn read_tree(root: &Path) -> BTreeMap<String, String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            (relative, fs::read_to_string(e.path()).unwrap())
        })
        .collect()
}

fn merge(staged: &Path, dest: &Path, previous: Manifest) -> Manifest {
    let mut context = ReconciliationContext::new(staged, dest)
        .unwrap()
        .with_previous_manifest(previous)
        .with_pipeline(ModifierPipeline::new());
    context.reconcile().unwrap();
    context.finish()
}

proptest! {
    /// Property: finalized manifests never list a path as both generated and static
    #[test]
    fn finalize_lists_are_disjoint(
        generated in prop::collection::vec(relative_path(), 0..10),
        static_files in prop::collection::vec(relative_path(), 0..10),
    ) {
        let mut builder = ManifestBuilder::new();
        for path in &generated {
            builder.record_generated(path.clone());
        }
        for path in &static_files {
            builder.record_static(path.clone());
        }
        let manifest = builder.finalize();

        prop_assert!(manifest.generated.is_disjoint(&manifest.static_files));
        for path in &generated {
            prop_assert!(manifest.is_generated(path));
        }
    }

    /// Property: the serialized manifest lists paths in sorted order
    #[test]
    fn manifest_json_is_sorted(paths in prop::collection::vec(relative_path(), 0..10)) {
        let mut builder = ManifestBuilder::new();
        for path in paths.iter().rev() {
            builder.record_generated(path.clone());
        }
        let json = builder.finalize().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let listed: Vec<String> = value["generated"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let mut sorted = listed.clone();
        sorted.sort();
        prop_assert_eq!(listed, sorted);
    }

    /// Property: join_relative with the root returns the child name
    #[test]
    fn join_relative_root_is_identity(name in "[a-zA-Z0-9_.]{1,20}") {
        prop_assert_eq!(join_relative("", &name), name.clone());
        prop_assert_eq!(join_relative("lib", &name), format!("lib/{}", name));
    }

    /// Property: an exact pattern matches itself
    #[test]
    fn glob_exact_match_works(path in "[a-zA-Z0-9_]{1,20}") {
        prop_assert!(glob_match(&path, &path).unwrap());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: merging the same staged tree twice changes nothing the second time
    #[test]
    fn merge_is_idempotent(staged_files in tree(), existing in tree()) {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&staged).unwrap();
        fs::create_dir_all(&dest).unwrap();
        write_tree(&staged, &staged_files);
        write_tree(&dest, &existing);

        let first = merge(&staged, &dest, Manifest::default());
        let after_first = read_tree(&dest);
        let second = merge(&staged, &dest, first.clone());

        prop_assert_eq!(read_tree(&dest), after_first);
        prop_assert_eq!(second, first);
    }

    /// Property: every staged file ends up in the destination as staged
    #[test]
    fn staged_files_win_without_modifiers(staged_files in tree()) {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&staged).unwrap();
        fs::create_dir_all(&dest).unwrap();
        write_tree(&staged, &staged_files);

        let manifest = merge(&staged, &dest, Manifest::default());

        prop_assert_eq!(read_tree(&dest), staged_files.clone());
        for path in staged_files.keys() {
            prop_assert!(manifest.is_generated(path));
        }
    }
}
