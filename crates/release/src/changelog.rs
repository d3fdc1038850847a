//! Changelog generation and formatting.
//!
//! Entries are built from the conventional commits attributed to a package
//! and prepended to its CHANGELOG file, newest release first.

use crate::bump::BumpSeverity;
use crate::conventional::{BumpPreset, parse_commit_message};
use crate::error::{Error, Result};
use crate::package::CommitRecord;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const HEADER: &str =
    "# Changelog\n\nAll notable changes to this project will be documented in this file.\n";

/// A single entry in the changelog.
#[derive(Debug, Clone)]
pub struct ChangelogEntry {
    /// Version being released.
    pub version: String,
    /// Release date.
    pub date: DateTime<Utc>,
    /// Changes in commit order.
    pub changes: Vec<ChangelogChange>,
}

/// A single change in the changelog.
#[derive(Debug, Clone)]
pub struct ChangelogChange {
    /// Severity the commit contributed.
    pub severity: BumpSeverity,
    /// Commit scope, if any.
    pub scope: Option<String>,
    /// Subject line without the `type(scope):` prefix.
    pub summary: String,
    /// Abbreviated commit hash.
    pub hash: String,
}

fn strip_header_prefix(subject: &str) -> &str {
    subject
        .split_once(": ")
        .map_or(subject, |(_, rest)| rest)
        .trim()
}

impl ChangelogEntry {
    /// Create a new changelog entry.
    #[must_use]
    pub fn new(version: impl Into<String>, date: DateTime<Utc>, changes: Vec<ChangelogChange>) -> Self {
        Self {
            version: version.into(),
            date,
            changes,
        }
    }

    /// Build an entry from commits. Commits that are not conventional or
    /// do not bump the version are left out.
    #[must_use]
    pub fn from_commits<'a>(
        version: impl Into<String>,
        date: DateTime<Utc>,
        commits: impl IntoIterator<Item = &'a CommitRecord>,
        preset: &BumpPreset,
    ) -> Self {
        let changes = commits
            .into_iter()
            .filter_map(|commit| {
                let descriptor = parse_commit_message(&commit.message)?;
                let severity = preset.severity(&descriptor);
                (severity > BumpSeverity::Prerelease).then(|| ChangelogChange {
                    severity,
                    scope: descriptor.scope,
                    summary: strip_header_prefix(commit.subject()).to_string(),
                    hash: commit.short_hash().to_string(),
                })
            })
            .collect();
        Self::new(version, date, changes)
    }

    /// Format this entry as Markdown.
    #[must_use]
    pub fn to_markdown(&self, include_hash: bool) -> String {
        let mut output = String::new();

        let date_str = self.date.format("%Y-%m-%d").to_string();
        let _ = writeln!(output, "## [{}] - {}\n", self.version, date_str);

        let sections = [
            (BumpSeverity::Major, "### Breaking Changes"),
            (BumpSeverity::Minor, "### Features"),
            (BumpSeverity::Patch, "### Fixes"),
        ];

        for (severity, title) in sections {
            let changes: Vec<_> = self
                .changes
                .iter()
                .filter(|c| c.severity == severity)
                .collect();
            if changes.is_empty() {
                continue;
            }
            let _ = writeln!(output, "{title}\n");
            for change in changes {
                output.push_str(&format_change(change, include_hash));
            }
            output.push('\n');
        }

        output
    }
}

fn format_change(change: &ChangelogChange, include_hash: bool) -> String {
    let mut line = String::from("- ");
    if let Some(scope) = &change.scope {
        let _ = write!(line, "**{scope}**: ");
    }
    line.push_str(&change.summary);
    if include_hash && !change.hash.is_empty() {
        let _ = write!(line, " ({})", change.hash);
    }
    line.push('\n');
    line
}

/// Insert `entry` above the newest release of `existing`, creating the
/// standard header when there is no file yet.
#[must_use]
pub fn prepend_entry(existing: Option<&str>, entry: &str) -> String {
    let existing = existing.unwrap_or(HEADER);

    existing.find("\n## ").map_or_else(
        || format!("{}\n\n{}", existing.trim_end(), entry),
        |idx| format!("{}\n{}\n", &existing[..idx], entry.trim_end()) + &existing[idx..],
    )
}

/// Prepend `entry` to the changelog at `path`, returning the previous
/// content (`None` when the file did not exist).
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn update_file(path: &Path, entry: &str) -> Result<Option<String>> {
    let previous = if path.exists() {
        Some(fs::read_to_string(path).map_err(|e| {
            Error::manifest(format!("Failed to read changelog: {e}"), Some(path.to_path_buf()))
        })?)
    } else {
        None
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, prepend_entry(previous.as_deref(), entry))?;
    Ok(previous)
}
