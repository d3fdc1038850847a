//! Collaborator contracts for the outside world.
//!
//! Plugins never touch git, registries or hosting providers directly: they
//! receive implementations of these traits through their constructors.
//! [`SystemGit`] and [`NpmCli`] shell out to the real tools; the GitHub
//! implementation lives in the `bonvoy-github` crate.

mod git;
mod npm;

pub use git::SystemGit;
pub use npm::NpmCli;

use crate::error::Result;
use crate::package::CommitRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Version control operations.
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Stage `files`.
    async fn add(&self, files: &[String]) -> Result<()>;

    /// Create a commit with `message`.
    async fn commit(&self, message: &str) -> Result<()>;

    /// Create an annotated tag at HEAD.
    async fn tag(&self, name: &str, message: &str) -> Result<()>;

    /// Push `branch` to `remote`.
    async fn push(&self, remote: &str, branch: &str) -> Result<()>;

    /// Push all tags to `remote`.
    async fn push_tags(&self, remote: &str, tags: &[String]) -> Result<()>;

    /// Switch to `branch`, creating it when `create` is set.
    async fn checkout(&self, branch: &str, create: bool) -> Result<()>;

    /// Name of the checked out branch.
    async fn get_current_branch(&self) -> Result<String>;

    /// Whether a local tag exists.
    async fn tag_exists(&self, tag: &str) -> Result<bool>;

    /// Commits after `tag` (or the whole history when `None`), oldest first.
    async fn get_commits_since_tag(&self, tag: Option<&str>) -> Result<Vec<CommitRecord>>;

    /// Most recent reachable tag.
    async fn get_last_tag(&self) -> Result<Option<String>>;

    /// SHA of HEAD.
    async fn get_head_sha(&self) -> Result<String>;

    /// Hard reset the working tree to `sha`.
    async fn reset_hard(&self, sha: &str) -> Result<()>;

    /// Delete a local tag.
    async fn delete_tag(&self, tag: &str) -> Result<()>;

    /// Delete tags from `remote`.
    async fn delete_remote_tags(&self, remote: &str, tags: &[String]) -> Result<()>;

    /// Force push the local `branch` to `remote`.
    async fn force_push(&self, remote: &str, branch: &str) -> Result<()>;
}

/// Package registry operations.
#[async_trait]
pub trait RegistryOperations: Send + Sync {
    /// Run a publish with extra `args` from the package directory `cwd`.
    async fn publish(&self, args: &[String], cwd: &Path) -> Result<()>;

    /// Version of `package@version` if it is published.
    async fn view(&self, package: &str, version: &str) -> Result<Option<String>>;

    /// Remove a published version.
    async fn unpublish(&self, package: &str, version: &str) -> Result<()>;
}

/// Parameters of a hosted release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseParams {
    /// Tag the release points at.
    pub tag_name: String,
    /// Display name.
    pub name: String,
    /// Markdown body.
    pub body: String,
    /// Create as draft.
    pub draft: bool,
    /// Mark as prerelease.
    pub prerelease: bool,
}

/// A created hosted release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Provider identifier, used to delete it.
    pub id: u64,
    /// Web URL.
    pub url: String,
    /// Tag name.
    pub tag: String,
}

/// Parameters of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestParams {
    /// Title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
}

/// A created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    /// PR number.
    pub number: u64,
    /// Web URL.
    pub url: String,
}

/// Hosting provider operations.
#[async_trait]
pub trait HostingOperations: Send + Sync {
    /// Create a release.
    async fn create_release(&self, params: &ReleaseParams) -> Result<ReleaseInfo>;

    /// Open a pull request.
    async fn create_pr(&self, params: &PullRequestParams) -> Result<PullRequestInfo>;

    /// Whether a release for `tag` already exists.
    async fn release_exists(&self, tag: &str) -> Result<bool>;

    /// Delete a release by id.
    async fn delete_release(&self, id: u64) -> Result<()>;
}
