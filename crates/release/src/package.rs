//! Workspace packages and the commits that touch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A releasable workspace package. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package name (e.g. `@scope/core`).
    pub name: String,
    /// Current version string as read from the manifest.
    pub version: String,
    /// Directory containing the manifest.
    pub path: PathBuf,
    /// Private packages are versioned but never published.
    #[serde(default)]
    pub private: bool,
    /// Runtime dependencies (name to range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies (name to range).
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl Package {
    /// Create a public package with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            private: false,
            dependencies: BTreeMap::new(),
            dev_dependencies: BTreeMap::new(),
        }
    }

    /// Mark the package private.
    #[must_use]
    pub const fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// One commit as presented by the git collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Full commit hash.
    pub hash: String,
    /// Full commit message (header, body and footers).
    pub message: String,
    /// Author name.
    pub author: String,
    /// Author date.
    pub date: DateTime<Utc>,
    /// Changed files, relative to the repository root.
    pub files: Vec<String>,
    /// Packages owning at least one changed file. Filled once by
    /// [`crate::assign::assign_commits`].
    #[serde(default)]
    pub packages: BTreeSet<String>,
}

impl CommitRecord {
    /// Create a commit record with no package attribution yet.
    #[must_use]
    pub fn new(
        hash: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
        date: DateTime<Utc>,
        files: Vec<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            message: message.into(),
            author: author.into(),
            date,
            files,
            packages: BTreeSet::new(),
        }
    }

    /// First line of the message.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    /// Abbreviated hash for display.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }

    /// Whether the commit was attributed to `package`.
    #[must_use]
    pub fn touches(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}
