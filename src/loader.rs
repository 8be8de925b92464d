//! `@path` directive resolution (§4.3).
//!
//! Grounded on `src/project/file_loader.rs`/`stdlib_loader.rs`'s
//! search-order pattern: a workspace-relative path is tried against each
//! configured search directory in order; a program-relative path is tried
//! next to the importing file. This module only resolves a directive to a
//! filesystem path (or reports that none exists) — parsing whatever a
//! resolved path contains as a metamodel document is the embedding host's
//! job (§1 Non-goals: no XMI/Ecore I/O here).

use crate::base::Name;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// The outcome of resolving one `@path` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    /// No candidate existed; the directive's placeholder is retained
    /// (§4.1, §4.3) rather than treated as an error.
    Unresolved,
}

/// Resolve every `@path` directive a [`crate::parser::ast::Module`]
/// collected, against `search_paths` (workspace-relative, `/`-prefixed
/// directives) or `program_dir` (program-relative, otherwise).
pub fn resolve_module_paths(
    path_directives: &IndexMap<Name, String>,
    search_paths: &[PathBuf],
    program_dir: Option<&Path>,
) -> IndexMap<Name, Resolution> {
    path_directives
        .iter()
        .map(|(name, raw)| (name.clone(), resolve_one(raw, search_paths, program_dir)))
        .collect()
}

fn resolve_one(raw: &str, search_paths: &[PathBuf], program_dir: Option<&Path>) -> Resolution {
    if let Some(rest) = raw.strip_prefix('/') {
        for dir in search_paths {
            let candidate = dir.join(rest);
            if candidate.is_file() {
                return Resolution::Found(candidate);
            }
        }
        Resolution::Unresolved
    } else if let Some(dir) = program_dir {
        let candidate = dir.join(raw);
        if candidate.is_file() {
            Resolution::Found(candidate)
        } else {
            Resolution::Unresolved
        }
    } else {
        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn workspace_relative_path_is_found_in_a_search_directory() {
        let root = tempdir().unwrap();
        let lib_dir = root.path().join("lib");
        fs::create_dir(&lib_dir).unwrap();
        fs::write(lib_dir.join("Families.atl"), "-- stub").unwrap();

        let mut directives = IndexMap::new();
        directives.insert(Name::new("Families"), "/lib/Families.atl".to_string());

        let search_paths = vec![root.path().to_path_buf()];
        let resolved = resolve_module_paths(&directives, &search_paths, None);
        match &resolved[&Name::new("Families")] {
            Resolution::Found(p) => assert!(p.ends_with("lib/Families.atl")),
            Resolution::Unresolved => panic!("expected to resolve"),
        }
    }

    #[test]
    fn program_relative_path_is_found_next_to_the_program() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("Helpers.atl"), "-- stub").unwrap();

        let mut directives = IndexMap::new();
        directives.insert(Name::new("Helpers"), "Helpers.atl".to_string());

        let resolved = resolve_module_paths(&directives, &[], Some(root.path()));
        assert_eq!(
            resolved[&Name::new("Helpers")],
            Resolution::Found(root.path().join("Helpers.atl"))
        );
    }

    #[test]
    fn missing_file_is_unresolved_not_an_error() {
        let mut directives = IndexMap::new();
        directives.insert(Name::new("Missing"), "/nope/Missing.atl".to_string());
        let resolved = resolve_module_paths(&directives, &[PathBuf::from("/tmp/does-not-exist")], None);
        assert_eq!(resolved[&Name::new("Missing")], Resolution::Unresolved);
    }

    #[test]
    fn first_matching_search_path_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(second.path().join("X.atl"), "-- in second").unwrap();
        fs::write(first.path().join("X.atl"), "-- in first").unwrap();

        let mut directives = IndexMap::new();
        directives.insert(Name::new("X"), "/X.atl".to_string());
        let search_paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let resolved = resolve_module_paths(&directives, &search_paths, None);
        match &resolved[&Name::new("X")] {
            Resolution::Found(p) => assert_eq!(p, &first.path().join("X.atl")),
            Resolution::Unresolved => panic!("expected to resolve"),
        }
    }
}
