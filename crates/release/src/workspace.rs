//! Workspace package discovery.

use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_FILE, PackageManifest};
use crate::package::Package;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load every package of the workspace at `root`, in discovery order.
///
/// The root manifest's `workspaces` globs are expanded in declaration order,
/// matches sorted by path. Directories without a `package.json` are skipped.
/// A root without workspaces is a single-package repository and yields the
/// root package alone.
///
/// # Errors
///
/// Returns an error if the root manifest or any member manifest is invalid,
/// or a glob pattern is malformed.
pub fn load_packages(root: &Path) -> Result<Vec<Package>> {
    let root_manifest = PackageManifest::read(root)?;
    let patterns = root_manifest.workspaces();

    if patterns.is_empty() {
        return Ok(vec![root_manifest.to_package()?]);
    }

    let mut packages: Vec<Package> = Vec::new();
    for dir in discover_members(root, &patterns)? {
        if !dir.join(MANIFEST_FILE).is_file() {
            debug!(dir = %dir.display(), "Skipping workspace directory without manifest");
            continue;
        }
        let package = PackageManifest::read(&dir)?.to_package()?;
        if packages.iter().any(|p| p.name == package.name) {
            continue;
        }
        debug!(package = %package.name, version = %package.version, "Discovered package");
        packages.push(package);
    }

    Ok(packages)
}

fn discover_members(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') {
            let full_pattern = root.join(pattern);
            let pattern_str = full_pattern.to_str().ok_or_else(|| {
                Error::manifest(
                    format!(
                        "Workspace glob pattern contains invalid UTF-8: {}",
                        full_pattern.display()
                    ),
                    Some(root.join(MANIFEST_FILE)),
                )
            })?;
            let matches = glob::glob(pattern_str).map_err(|e| {
                Error::manifest(
                    format!("Invalid workspace glob '{pattern}': {e}"),
                    Some(root.join(MANIFEST_FILE)),
                )
            })?;
            let mut found: Vec<PathBuf> = matches.flatten().filter(|p| p.is_dir()).collect();
            found.sort();
            for dir in found {
                if !paths.contains(&dir) {
                    paths.push(dir);
                }
            }
        } else {
            let dir = root.join(pattern);
            if !paths.contains(&dir) {
                paths.push(dir);
            }
        }
    }

    Ok(paths)
}
