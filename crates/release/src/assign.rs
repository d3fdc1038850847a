//! Commit-to-package attribution.
//!
//! Attribution is purely path based: a file belongs to the deepest package
//! whose directory contains it. Scopes in commit messages are ignored.

use crate::package::{CommitRecord, Package};
use std::collections::BTreeSet;
use std::path::Path;

/// Normalize `path` to a `/`-separated string relative to `root`.
fn relative_to(path: &Path, root: &Path) -> String {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).unwrap_or(path)
    } else {
        path
    };

    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn contains(package_rel: &str, file_rel: &str) -> bool {
    if package_rel.is_empty() {
        // The workspace root only owns top-level files.
        return !file_rel.contains('/');
    }
    file_rel == package_rel
        || file_rel
            .strip_prefix(package_rel)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Name of the package owning a single file, if any.
#[must_use]
pub fn owner_of<'p>(file: &str, packages: &'p [Package], root: &Path) -> Option<&'p str> {
    let file_rel = relative_to(Path::new(file), root);

    packages
        .iter()
        .filter_map(|pkg| {
            let pkg_rel = relative_to(&pkg.path, root);
            contains(&pkg_rel, &file_rel).then_some((pkg.name.as_str(), pkg_rel.len()))
        })
        .max_by_key(|(_, depth)| *depth)
        .map(|(name, _)| name)
}

/// Packages owning at least one of `files`.
#[must_use]
pub fn assign_packages(files: &[String], packages: &[Package], root: &Path) -> BTreeSet<String> {
    files
        .iter()
        .filter_map(|file| owner_of(file, packages, root))
        .map(str::to_string)
        .collect()
}

/// Populate `packages` on every commit.
pub fn assign_commits(commits: &mut [CommitRecord], packages: &[Package], root: &Path) {
    for commit in commits.iter_mut() {
        commit.packages = assign_packages(&commit.files, packages, root);
    }
}
