//! Release configuration types.
//!
//! The configuration is read from a single `bonvoy.config.json` at the
//! workspace root. Every field has a default, so an absent file is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the workspace configuration.
pub const CONFIG_FILE: &str = "bonvoy.config.json";

/// Commit-type to bump mapping preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresetConfig {
    /// A built-in preset by name (`angular`).
    Named(String),
    /// A custom `type -> severity` table (e.g. `{"fix": "minor"}`).
    Custom(BTreeMap<String, String>),
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self::Named("angular".to_string())
    }
}

/// Complete release configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BonvoyConfig {
    /// Tag template; `{name}` and `{version}` are substituted.
    pub tag_format: String,
    /// Release commit template; `{packages}` is substituted.
    pub commit_message: String,
    /// Commit classification preset.
    pub preset: PresetConfig,
    /// Identifier used for prerelease bumps (`beta` gives `1.2.4-beta.0`).
    pub prerelease_id: Option<String>,
    /// Changelog generation settings.
    pub changelog: ChangelogConfig,
    /// Git plugin settings.
    pub git: GitConfig,
    /// npm plugin settings.
    pub npm: NpmConfig,
    /// GitHub plugin settings.
    pub github: GitHubConfig,
    /// Release pull request settings.
    pub pull_request: PullRequestConfig,
    /// Retry policy for hosting-provider calls.
    pub retry: RetryConfig,
}

impl Default for BonvoyConfig {
    fn default() -> Self {
        Self {
            tag_format: "{name}@{version}".to_string(),
            commit_message: "chore(release): :bookmark: {packages} [skip ci]".to_string(),
            preset: PresetConfig::default(),
            prerelease_id: None,
            changelog: ChangelogConfig::default(),
            git: GitConfig::default(),
            npm: NpmConfig::default(),
            github: GitHubConfig::default(),
            pull_request: PullRequestConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl BonvoyConfig {
    /// Location of the configuration file for a workspace.
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load the workspace configuration, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::config(
                format!("Failed to parse {}: {e}", path.display()),
                "Check the file for JSON syntax errors and unknown value types",
            )
        })
    }

    /// Format a tag name for a package release.
    #[must_use]
    pub fn format_tag(&self, name: &str, version: &str) -> String {
        self.tag_format
            .replace("{name}", name)
            .replace("{version}", version)
    }

    /// Format the release commit message for the given package names.
    #[must_use]
    pub fn format_commit_message(&self, packages: &[String]) -> String {
        self.commit_message
            .replace("{packages}", &packages.join(", "))
    }
}

/// Changelog generation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangelogConfig {
    /// Path to the CHANGELOG file relative to the package root.
    pub path: String,
    /// Append the short commit hash to each line.
    pub include_commit_hash: bool,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            path: "CHANGELOG.md".to_string(),
            include_commit_hash: true,
        }
    }
}

/// Git-related release configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GitConfig {
    /// Whether to push the release commit and tags.
    pub push: bool,
    /// Remote to push to.
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            push: true,
            remote: "origin".to_string(),
        }
    }
}

/// npm publish configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NpmConfig {
    /// `--access` value (`public` or `restricted`).
    pub access: Option<String>,
    /// Custom registry URL.
    pub registry: Option<String>,
}

/// GitHub release configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    /// Repository owner; read from the remote when absent.
    pub owner: Option<String>,
    /// Repository name; read from the remote when absent.
    pub repo: Option<String>,
    /// Create releases as drafts.
    pub draft: bool,
}

/// Release pull request configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestConfig {
    /// Whether the optional PR stage runs.
    pub enabled: bool,
    /// Base branch of the PR.
    pub base: String,
    /// Head branch created for the release.
    pub branch: String,
    /// PR title template; `{packages}` is substituted.
    pub title: String,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base: "main".to_string(),
            branch: "release/bonvoy".to_string(),
            title: "chore(release): {packages}".to_string(),
        }
    }
}

/// Retry settings for outbound provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Dry-run flag threaded through every stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DryRun {
    /// Perform side effects.
    #[default]
    No,
    /// Only report what would happen.
    Yes,
}

impl DryRun {
    /// Whether side effects must be skipped.
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for DryRun {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

impl fmt::Display for DryRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::No => write!(f, "no"),
            Self::Yes => write!(f, "yes"),
        }
    }
}
