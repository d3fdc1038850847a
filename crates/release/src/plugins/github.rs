//! Hosted releases and the release pull request.
//!
//! Actions recorded:
//! - `release`: `{id, tag, url}`
//! - `pr`: `{number, url}`

use super::{Plugin, missing_field, step_outcome, tap_rollback};
use crate::context::{PrContext, ReleaseContext, RollbackContext};
use crate::error::Result;
use crate::hooks::Hooks;
use crate::journal::ActionEntry;
use crate::ops::{HostingOperations, PullRequestParams, ReleaseParams};
use crate::retry::{RetryPolicy, with_retry};
use crate::rollback::StepOutcome;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const NAME: &str = "github";

/// Creates one hosted release per changed package and opens the release PR.
pub struct GitHubPlugin {
    hosting: Arc<dyn HostingOperations>,
}

impl GitHubPlugin {
    /// Use `hosting` for every provider call.
    #[must_use]
    pub fn new(hosting: Arc<dyn HostingOperations>) -> Self {
        Self { hosting }
    }

    async fn make_releases(&self, ctx: &mut ReleaseContext) -> Result<()> {
        let policy = RetryPolicy::from(ctx.config.retry);
        let changed = ctx.changed_packages.clone();

        for package in &changed {
            let Some(version) = ctx.version_of(&package.name).map(str::to_string) else {
                continue;
            };
            let tag = ctx.config.format_tag(&package.name, &version);

            if ctx.is_dry_run() {
                info!(package = %package.name, tag = %tag, "Would create release");
                continue;
            }

            let exists = with_retry(policy, "release exists", || {
                self.hosting.release_exists(&tag)
            })
            .await?;
            if exists {
                info!(tag = %tag, "Release already exists; skipping");
                continue;
            }

            let params = ReleaseParams {
                tag_name: tag.clone(),
                name: tag.clone(),
                body: ctx.changelogs.get(&package.name).cloned().unwrap_or_default(),
                draft: ctx.config.github.draft,
                prerelease: version.contains('-'),
            };
            let release = with_retry(policy, "create release", || {
                self.hosting.create_release(&params)
            })
            .await?;
            ctx.record(
                NAME,
                "release",
                json!({ "id": release.id, "tag": release.tag, "url": release.url }),
            )?;
            info!(tag = %release.tag, url = %release.url, "Created release");
            ctx.releases.insert(package.name.clone(), release);
        }
        Ok(())
    }

    async fn open_pr(&self, ctx: &mut PrContext) -> Result<()> {
        if ctx.is_dry_run() {
            info!(branch = %ctx.branch, base = %ctx.base_branch, "Would open release pull request");
            return Ok(());
        }

        let policy = RetryPolicy::from(ctx.config.retry);
        let params = PullRequestParams {
            title: ctx.title.clone(),
            body: ctx.body.clone(),
            head: ctx.branch.clone(),
            base: ctx.base_branch.clone(),
        };
        let pr = with_retry(policy, "create pull request", || {
            self.hosting.create_pr(&params)
        })
        .await?;
        ctx.record(NAME, "pr", json!({ "number": pr.number, "url": pr.url }))?;
        info!(number = pr.number, url = %pr.url, "Opened release pull request");
        ctx.pr = Some(pr);
        Ok(())
    }

    async fn compensate(&self, entry: &ActionEntry, ctx: &RollbackContext) -> StepOutcome {
        match entry.action.as_str() {
            "release" => {
                let Some(id) = entry.data.get("id").and_then(serde_json::Value::as_u64) else {
                    return missing_field(entry, "id");
                };
                let policy = RetryPolicy::from(ctx.config.retry);
                let result = with_retry(policy, "delete release", || {
                    self.hosting.delete_release(id)
                })
                .await;
                step_outcome(entry, result)
            }
            "pr" => StepOutcome::Skipped("pull requests are left open for review".to_string()),
            other => StepOutcome::Skipped(format!("unknown github action '{other}'")),
        }
    }
}

impl Plugin for GitHubPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(self: Arc<Self>, hooks: &mut Hooks) {
        let this = Arc::clone(&self);
        hooks
            .make_release
            .tap(NAME, move |ctx: &mut ReleaseContext| {
                let this = Arc::clone(&this);
                Box::pin(async move { this.make_releases(ctx).await })
            });

        let this = Arc::clone(&self);
        hooks.create_pr.tap(NAME, move |ctx: &mut PrContext| {
            let this = Arc::clone(&this);
            Box::pin(async move { this.open_pr(ctx).await })
        });

        tap_rollback!(hooks, self, NAME);
    }
}
