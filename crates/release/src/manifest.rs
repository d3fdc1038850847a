//! `package.json` reading and writing.
//!
//! Manifests are edited as JSON objects with key order preserved, so a
//! version write changes a single line of the file.

use crate::error::{Error, Result};
use crate::package::Package;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of an npm manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// A parsed `package.json`.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl PackageManifest {
    /// Read the manifest in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::manifest(format!("Failed to read {MANIFEST_FILE}: {e}"), Some(path.clone()))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            Error::manifest(format!("Failed to parse {MANIFEST_FILE}: {e}"), Some(path.clone()))
        })?;
        match value {
            Value::Object(doc) => Ok(Self { path, doc }),
            _ => Err(Error::manifest(
                format!("{MANIFEST_FILE} must contain a JSON object"),
                Some(path),
            )),
        }
    }

    /// Manifest location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.doc.get(key).and_then(Value::as_str)
    }

    /// `name` field.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// `version` field.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.str_field("version")
    }

    /// `private` field; absent means public.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.doc
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Workspace globs: `"workspaces": [...]` or `"workspaces": {"packages": [...]}`.
    #[must_use]
    pub fn workspaces(&self) -> Vec<String> {
        let list = match self.doc.get("workspaces") {
            Some(Value::Array(items)) => Some(items),
            Some(Value::Object(obj)) => obj.get("packages").and_then(Value::as_array),
            _ => None,
        };
        list.map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
    }

    fn dependency_map(&self, key: &str) -> BTreeMap<String, String> {
        self.doc
            .get(key)
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(k, v)| v.as_str().map(|r| (k.clone(), r.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert to a [`Package`] rooted at the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is missing.
    pub fn to_package(&self) -> Result<Package> {
        let name = self.name().ok_or_else(|| {
            Error::manifest("Manifest has no \"name\" field", Some(self.path.clone()))
        })?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut package = Package::new(name, self.version().unwrap_or("0.0.0"), dir)
            .with_private(self.is_private());
        package.dependencies = self.dependency_map("dependencies");
        package.dev_dependencies = self.dependency_map("devDependencies");
        Ok(package)
    }

    /// Set `version`, returning the previous value.
    pub fn set_version(&mut self, version: &str) -> Option<String> {
        let previous = self.version().map(str::to_string);
        self.doc
            .insert("version".to_string(), Value::String(version.to_string()));
        previous
    }

    /// Write the manifest back with two-space indentation and a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&self.doc)?;
        content.push('\n');
        fs::write(&self.path, content).map_err(|e| {
            Error::manifest(
                format!("Failed to write {MANIFEST_FILE}: {e}"),
                Some(self.path.clone()),
            )
        })
    }
}

/// Update the `version` of the manifest in `dir`, returning the previous value.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or written.
pub fn write_version(dir: &Path, version: &str) -> Result<Option<String>> {
    let mut manifest = PackageManifest::read(dir)?;
    let previous = manifest.set_version(version);
    manifest.write()?;
    Ok(previous)
}
