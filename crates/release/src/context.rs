//! Stage contexts.
//!
//! Each stage wraps the context of the stage before it and dereferences to
//! it, so handlers read everything earlier stages produced while only the
//! current stage's own fields are exposed for mutation.

use crate::bump::VersionRequest;
use crate::config::{BonvoyConfig, DryRun};
use crate::error::Result;
use crate::journal::{ActionEntry, ActionJournal};
use crate::ops::{PullRequestInfo, ReleaseInfo};
use crate::package::{CommitRecord, Package};
use crate::rollback::{RollbackReport, RollbackStep, StepOutcome};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

/// Context of the `modifyConfig` hook.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    /// Workspace root.
    pub root_path: PathBuf,
    /// Dry-run flag.
    pub dry_run: DryRun,
}

/// Base context shared by every stage.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration (after `modifyConfig`).
    pub config: BonvoyConfig,
    /// All workspace packages in discovery order.
    pub packages: Vec<Package>,
    /// Packages being released, in discovery order.
    pub changed_packages: Vec<Package>,
    /// Workspace root.
    pub root_path: PathBuf,
    /// Dry-run flag.
    pub dry_run: DryRun,
    /// Commits since the last release, with packages assigned.
    pub commits: Vec<CommitRecord>,
    /// Package currently processed by a per-package hook.
    pub current_package: Option<Package>,
    /// Journal of the run; absent for dry runs.
    pub journal: Option<Arc<ActionJournal>>,
}

impl Context {
    /// Create a context with no changed packages and no journal.
    #[must_use]
    pub fn new(
        config: BonvoyConfig,
        root_path: impl Into<PathBuf>,
        packages: Vec<Package>,
        commits: Vec<CommitRecord>,
        dry_run: DryRun,
    ) -> Self {
        Self {
            config,
            packages,
            changed_packages: Vec::new(),
            root_path: root_path.into(),
            dry_run,
            commits,
            current_package: None,
            journal: None,
        }
    }

    /// Whether side effects must be skipped.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run.is_dry_run()
    }

    /// Record a completed side effect in the journal, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal rejects or fails to persist the entry.
    pub fn record(
        &self,
        plugin: &str,
        action: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.record(plugin, action, data)?;
        }
        Ok(())
    }

    /// Commits attributed to `package`, oldest first.
    pub fn commits_for<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a CommitRecord> {
        self.commits.iter().filter(move |c| c.touches(package))
    }

    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Names of the changed packages.
    #[must_use]
    pub fn changed_names(&self) -> Vec<String> {
        self.changed_packages.iter().map(|p| p.name.clone()).collect()
    }
}

/// Access to the base [`Context`] of any stage context.
pub trait StageContext {
    /// Shared context.
    fn context(&self) -> &Context;
    /// Mutable shared context, for the driver.
    fn context_mut(&mut self) -> &mut Context;
}

impl StageContext for Context {
    fn context(&self) -> &Context {
        self
    }

    fn context_mut(&mut self) -> &mut Context {
        self
    }
}

macro_rules! stage_context {
    ($ty:ty, $inner:ident, $target:ty) => {
        impl Deref for $ty {
            type Target = $target;

            fn deref(&self) -> &Self::Target {
                &self.$inner
            }
        }

        impl StageContext for $ty {
            fn context(&self) -> &Context {
                self.$inner.context()
            }

            fn context_mut(&mut self) -> &mut Context {
                self.$inner.context_mut()
            }
        }
    };
}

/// Context of the version stage.
#[derive(Debug, Clone)]
pub struct VersionContext {
    base: Context,
    /// Resolved versions by package name.
    pub versions: BTreeMap<String, String>,
    /// Requests that produced the versions.
    pub bumps: BTreeMap<String, VersionRequest>,
}

impl VersionContext {
    /// Wrap the base context.
    #[must_use]
    pub const fn new(base: Context) -> Self {
        Self {
            base,
            versions: BTreeMap::new(),
            bumps: BTreeMap::new(),
        }
    }

    /// Version being released for `package`.
    #[must_use]
    pub fn version_of(&self, package: &str) -> Option<&str> {
        self.versions.get(package).map(String::as_str)
    }
}

stage_context!(VersionContext, base, Context);

/// Context of the changelog stage.
#[derive(Debug, Clone)]
pub struct ChangelogContext {
    version: VersionContext,
    /// Generated changelog text by package name.
    pub changelogs: BTreeMap<String, String>,
}

impl ChangelogContext {
    /// Wrap the version context.
    #[must_use]
    pub const fn new(version: VersionContext) -> Self {
        Self {
            version,
            changelogs: BTreeMap::new(),
        }
    }
}

stage_context!(ChangelogContext, version, VersionContext);

/// Context of the publish stage.
#[derive(Debug, Clone)]
pub struct PublishContext {
    changelog: ChangelogContext,
    /// Names of packages published by this run.
    pub published_packages: Vec<String>,
}

impl PublishContext {
    /// Wrap the changelog context.
    #[must_use]
    pub const fn new(changelog: ChangelogContext) -> Self {
        Self {
            changelog,
            published_packages: Vec::new(),
        }
    }
}

stage_context!(PublishContext, changelog, ChangelogContext);

/// Context of the release stage.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    publish: PublishContext,
    /// Hosted releases by package name.
    pub releases: BTreeMap<String, ReleaseInfo>,
}

impl ReleaseContext {
    /// Wrap the publish context.
    #[must_use]
    pub const fn new(publish: PublishContext) -> Self {
        Self {
            publish,
            releases: BTreeMap::new(),
        }
    }
}

stage_context!(ReleaseContext, publish, PublishContext);

/// Context of the pull request stage.
#[derive(Debug, Clone)]
pub struct PrContext {
    release: ReleaseContext,
    /// Head branch.
    pub branch: String,
    /// Base branch.
    pub base_branch: String,
    /// PR title.
    pub title: String,
    /// PR body.
    pub body: String,
    /// The created PR.
    pub pr: Option<PullRequestInfo>,
}

impl PrContext {
    /// Wrap the release context.
    #[must_use]
    pub const fn new(
        release: ReleaseContext,
        branch: String,
        base_branch: String,
        title: String,
        body: String,
    ) -> Self {
        Self {
            release,
            branch,
            base_branch,
            title,
            body,
            pr: None,
        }
    }
}

stage_context!(PrContext, release, ReleaseContext);

/// Context of the `rollback` hook.
///
/// The hook runs once per recorded action, newest first; `cursor` points at
/// the action being compensated.
#[derive(Debug, Clone)]
pub struct RollbackContext {
    base: Context,
    /// Every recorded action, oldest first.
    pub actions: Vec<ActionEntry>,
    /// Index into `actions` of the action being compensated.
    pub cursor: Option<usize>,
    /// Outcomes so far.
    pub report: RollbackReport,
}

impl RollbackContext {
    /// Wrap the base context with the journal's actions.
    #[must_use]
    pub const fn new(base: Context, actions: Vec<ActionEntry>) -> Self {
        Self {
            base,
            actions,
            cursor: None,
            report: RollbackReport::empty(),
        }
    }

    /// The action being compensated.
    #[must_use]
    pub fn current(&self) -> Option<&ActionEntry> {
        self.cursor.and_then(|i| self.actions.get(i))
    }

    /// The action being compensated, if `plugin` recorded it.
    #[must_use]
    pub fn current_for(&self, plugin: &str) -> Option<ActionEntry> {
        self.current().filter(|a| a.plugin == plugin).cloned()
    }

    /// Actions recorded by `plugin`, newest first.
    pub fn actions_for<'a>(&'a self, plugin: &'a str) -> impl Iterator<Item = &'a ActionEntry> {
        self.actions.iter().rev().filter(move |a| a.plugin == plugin)
    }

    /// Record the outcome for the current action.
    pub fn push_outcome(&mut self, entry: &ActionEntry, outcome: StepOutcome) {
        let index = self.cursor.unwrap_or_default();
        self.report.steps.push(RollbackStep {
            index,
            plugin: entry.plugin.clone(),
            action: entry.action.clone(),
            outcome,
        });
    }

    /// Whether an outcome was recorded for the current action.
    #[must_use]
    pub fn current_handled(&self) -> bool {
        self.cursor
            .is_some_and(|i| self.report.steps.iter().any(|s| s.index == i))
    }
}

stage_context!(RollbackContext, base, Context);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn base() -> Context {
        let packages = vec![
            Package::new("@test/core", "1.0.0", "/repo/packages/core"),
            Package::new("@test/utils", "1.0.0", "/repo/packages/utils"),
        ];
        let mut commit = CommitRecord::new(
            "abc",
            "feat: x",
            "dev",
            Utc::now(),
            vec!["packages/core/a.ts".into()],
        );
        commit.packages.insert("@test/core".into());
        Context::new(BonvoyConfig::default(), "/repo", packages, vec![commit], DryRun::No)
    }

    #[test]
    fn test_deref_chain_reaches_base() {
        let mut version = VersionContext::new(base());
        version.versions.insert("@test/core".into(), "1.1.0".into());
        let changelog = ChangelogContext::new(version);
        let publish = PublishContext::new(changelog);
        let release = ReleaseContext::new(publish);

        assert_eq!(release.packages.len(), 2);
        assert_eq!(release.version_of("@test/core"), Some("1.1.0"));
        assert!(release.changelogs.is_empty());
        assert!(release.published_packages.is_empty());
    }

    #[test]
    fn test_context_mut_through_layers() {
        let mut publish = PublishContext::new(ChangelogContext::new(VersionContext::new(base())));
        publish.context_mut().current_package = Some(Package::new("x", "1.0.0", "/repo/x"));
        assert_eq!(publish.current_package.as_ref().map(|p| p.name.as_str()), Some("x"));
    }

    #[test]
    fn test_commits_for() {
        let ctx = base();
        assert_eq!(ctx.commits_for("@test/core").count(), 1);
        assert_eq!(ctx.commits_for("@test/utils").count(), 0);
    }

    #[test]
    fn test_record_without_journal_is_noop() {
        let ctx = base();
        assert!(ctx.record("git", "tag", json!({"tags": ["v1"]})).is_ok());
    }

    #[test]
    fn test_rollback_cursor() {
        let entry = |plugin: &str, action: &str| ActionEntry {
            plugin: plugin.into(),
            action: action.into(),
            data: json!({}),
            timestamp: Utc::now(),
            status: crate::journal::ActionStatus::Completed,
        };
        let mut ctx = RollbackContext::new(
            base(),
            vec![entry("git", "commit"), entry("npm", "publish"), entry("git", "tag")],
        );
        assert!(ctx.current().is_none());

        ctx.cursor = Some(2);
        assert!(ctx.current_for("npm").is_none());
        let current = ctx.current_for("git").unwrap();
        assert_eq!(current.action, "tag");
        assert!(!ctx.current_handled());
        ctx.push_outcome(&current, StepOutcome::Compensated);
        assert!(ctx.current_handled());

        let git: Vec<_> = ctx.actions_for("git").map(|a| a.action.as_str()).collect();
        assert_eq!(git, vec!["tag", "commit"]);
    }
}
