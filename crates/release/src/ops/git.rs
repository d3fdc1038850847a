//! [`GitOperations`] backed by the `git` binary.

use super::GitOperations;
use crate::error::{Error, Result};
use crate::package::CommitRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

/// Runs `git` in a working tree.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: PathBuf,
}

impl SystemGit {
    /// Operate on the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, "Running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| Error::git(format!("Failed to run git {}: {e}", args.join(" "))))
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fetch URL of `remote`, if it is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    pub async fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let output = self.output(&["remote", "get-url", remote]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    /// Files changed in `hash`. `--root` lists the initial commit's files too.
    async fn changed_files(&self, hash: &str) -> Result<Vec<String>> {
        let stdout = self
            .run(&["diff-tree", "--no-commit-id", "--name-only", "-r", "--root", hash])
            .await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// One `git log` record before its files are known.
#[derive(Debug, PartialEq, Eq)]
struct LogEntry {
    hash: String,
    author: String,
    date: DateTime<Utc>,
    message: String,
}

fn parse_log(stdout: &str) -> Result<Vec<LogEntry>> {
    stdout
        .split(RECORD_SEP)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let (Some(hash), Some(author), Some(date), Some(message)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::git(format!("Malformed git log record: {record}")));
            };
            let date = DateTime::parse_from_rfc3339(date)
                .map_err(|e| Error::git(format!("Invalid commit date '{date}': {e}")))?
                .with_timezone(&Utc);
            Ok(LogEntry {
                hash: hash.to_string(),
                author: author.to_string(),
                date,
                message: message.trim_end().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl GitOperations for SystemGit {
    async fn add(&self, files: &[String]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await.map(drop)
    }

    async fn tag(&self, name: &str, message: &str) -> Result<()> {
        self.run(&["tag", "-a", name, "-m", message]).await.map(drop)
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", remote, branch]).await.map(drop)
    }

    async fn push_tags(&self, remote: &str, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let refs: Vec<String> = tags.iter().map(|t| format!("refs/tags/{t}")).collect();
        let mut args = vec!["push", remote];
        args.extend(refs.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn checkout(&self, branch: &str, create: bool) -> Result<()> {
        if create {
            self.run(&["checkout", "-b", branch]).await.map(drop)
        } else {
            self.run(&["checkout", branch]).await.map(drop)
        }
    }

    async fn get_current_branch(&self) -> Result<String> {
        Ok(self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool> {
        let reference = format!("refs/tags/{tag}");
        let output = self
            .output(&["rev-parse", "-q", "--verify", &reference])
            .await?;
        Ok(output.status.success())
    }

    async fn get_commits_since_tag(&self, tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        let range = tag.map(|t| format!("{t}..HEAD"));
        let mut args = vec!["log", "--reverse", "--format=%H%x1f%an%x1f%aI%x1f%B%x1e"];
        if let Some(range) = &range {
            args.push(range);
        }
        let stdout = self.run(&args).await?;

        let mut commits = Vec::new();
        for entry in parse_log(&stdout)? {
            let files = self.changed_files(&entry.hash).await?;
            commits.push(CommitRecord::new(
                entry.hash,
                entry.message,
                entry.author,
                entry.date,
                files,
            ));
        }
        debug!(count = commits.len(), since = ?tag, "Read commits");
        Ok(commits)
    }

    async fn get_last_tag(&self) -> Result<Option<String>> {
        let output = self.output(&["describe", "--tags", "--abbrev=0"]).await?;
        if !output.status.success() {
            // No tags yet.
            return Ok(None);
        }
        let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!tag.is_empty()).then_some(tag))
    }

    async fn get_head_sha(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn reset_hard(&self, sha: &str) -> Result<()> {
        self.run(&["reset", "--hard", sha]).await.map(drop)
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        self.run(&["tag", "-d", tag]).await.map(drop)
    }

    async fn delete_remote_tags(&self, remote: &str, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let refs: Vec<String> = tags.iter().map(|t| format!("refs/tags/{t}")).collect();
        let mut args = vec!["push", remote, "--delete"];
        args.extend(refs.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn force_push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "--force", remote, branch]).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_records() {
        let stdout = "abc123\x1fAlice\x1f2024-03-01T10:00:00+01:00\x1ffeat: a\n\nbody\n\x1e\n\
                      def456\x1fBob\x1f2024-03-02T10:00:00Z\x1ffix: b\n\x1e\n";
        let entries = parse_log(stdout).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, "abc123");
        assert_eq!(entries[0].author, "Alice");
        assert_eq!(entries[0].message, "feat: a\n\nbody");
        assert_eq!(entries[0].date.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert_eq!(entries[1].message, "fix: b");
    }

    #[test]
    fn test_parse_log_empty() {
        assert!(parse_log("").unwrap().is_empty());
        assert!(parse_log("\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_log_malformed() {
        assert!(parse_log("abc\x1fonly-two").is_err());
    }

    #[tokio::test]
    async fn test_reads_commits_from_real_repository() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        let git = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(root)
                .output()
        };
        // Skip quietly where git is unavailable.
        if git(&["init", "-q"]).is_err() {
            return;
        }
        git(&["config", "user.email", "dev@example.com"]).unwrap();
        git(&["config", "user.name", "Dev"]).unwrap();
        std::fs::create_dir_all(root.join("packages/core")).unwrap();
        std::fs::write(root.join("packages/core/index.js"), "x").unwrap();
        git(&["add", "."]).unwrap();
        git(&["-c", "commit.gpgsign=false", "commit", "-q", "-m", "feat(core): initial"]).unwrap();

        let system = SystemGit::new(root);
        let commits = system.get_commits_since_tag(None).await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "feat(core): initial");
        assert_eq!(commits[0].files, vec!["packages/core/index.js".to_string()]);
        assert_eq!(system.get_last_tag().await.unwrap(), None);
    }
}
