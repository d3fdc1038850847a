//! Release commit, tags and push.
//!
//! Actions recorded, in order:
//! - `commit`: `{previousSha, message}`
//! - `tag`: `{tags}`
//! - `push`: `{remote, branch, previousSha}` (only when pushing)
//! - `pushTags`: `{remote, tags}` (only when pushing)

use super::{Plugin, missing_field, step_outcome, tap_rollback};
use crate::context::{PublishContext, RollbackContext};
use crate::error::Result;
use crate::hooks::Hooks;
use crate::journal::ActionEntry;
use crate::manifest::MANIFEST_FILE;
use crate::ops::GitOperations;
use crate::rollback::StepOutcome;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const NAME: &str = "git";

/// Commits the release, tags every changed package and pushes.
pub struct GitPlugin {
    git: Arc<dyn GitOperations>,
}

impl GitPlugin {
    /// Use `git` for every operation.
    #[must_use]
    pub fn new(git: Arc<dyn GitOperations>) -> Self {
        Self { git }
    }

    async fn release(&self, ctx: &PublishContext) -> Result<()> {
        let names = ctx.changed_names();
        let message = ctx.config.format_commit_message(&names);
        let tags: Vec<String> = ctx
            .changed_packages
            .iter()
            .filter_map(|p| {
                ctx.version_of(&p.name)
                    .map(|v| ctx.config.format_tag(&p.name, v))
            })
            .collect();

        if ctx.is_dry_run() {
            info!(message = %message, tags = ?tags, "Would commit and tag release");
            return Ok(());
        }

        let mut files = Vec::new();
        for package in &ctx.changed_packages {
            for candidate in [
                package.path.join(MANIFEST_FILE),
                package.path.join(&ctx.config.changelog.path),
            ] {
                if candidate.exists() {
                    files.push(candidate.to_string_lossy().into_owned());
                }
            }
        }

        let previous_sha = self.git.get_head_sha().await?;
        self.git.add(&files).await?;
        self.git.commit(&message).await?;
        ctx.record(
            NAME,
            "commit",
            json!({ "previousSha": previous_sha, "message": message }),
        )?;
        info!(message = %message, "Created release commit");

        for tag in &tags {
            self.git.tag(tag, tag).await?;
            ctx.record(NAME, "tag", json!({ "tags": [tag] }))?;
            info!(tag = %tag, "Created tag");
        }

        if !ctx.config.git.push {
            return Ok(());
        }

        let remote = ctx.config.git.remote.clone();
        let branch = self.git.get_current_branch().await?;
        self.git.push(&remote, &branch).await?;
        ctx.record(
            NAME,
            "push",
            json!({ "remote": remote, "branch": branch, "previousSha": previous_sha }),
        )?;

        self.git.push_tags(&remote, &tags).await?;
        ctx.record(NAME, "pushTags", json!({ "remote": remote, "tags": tags }))?;
        info!(remote = %remote, branch = %branch, "Pushed release");
        Ok(())
    }

    async fn compensate(&self, entry: &ActionEntry, _ctx: &RollbackContext) -> StepOutcome {
        match entry.action.as_str() {
            "commit" => {
                let Some(sha) = entry.data_str("previousSha") else {
                    return missing_field(entry, "previousSha");
                };
                step_outcome(entry, self.git.reset_hard(sha).await)
            }
            "tag" => {
                let mut failures = Vec::new();
                for tag in entry.data_strings("tags") {
                    if let Err(e) = self.git.delete_tag(&tag).await {
                        failures.push(format!("{tag}: {e}"));
                    }
                }
                if failures.is_empty() {
                    StepOutcome::Compensated
                } else {
                    warn!(failures = ?failures, "Could not delete tags; continuing rollback");
                    StepOutcome::Warning(format!("failed to delete tags: {}", failures.join("; ")))
                }
            }
            "push" => {
                let (Some(remote), Some(branch), Some(sha)) = (
                    entry.data_str("remote"),
                    entry.data_str("branch"),
                    entry.data_str("previousSha"),
                ) else {
                    return missing_field(entry, "remote/branch/previousSha");
                };
                let result = async {
                    self.git.reset_hard(sha).await?;
                    self.git.force_push(remote, branch).await
                }
                .await;
                step_outcome(entry, result)
            }
            "pushTags" => {
                let Some(remote) = entry.data_str("remote") else {
                    return missing_field(entry, "remote");
                };
                let tags = entry.data_strings("tags");
                step_outcome(entry, self.git.delete_remote_tags(remote, &tags).await)
            }
            other => StepOutcome::Skipped(format!("unknown git action '{other}'")),
        }
    }
}

impl Plugin for GitPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(self: Arc<Self>, hooks: &mut Hooks) {
        let this = Arc::clone(&self);
        hooks
            .before_publish
            .tap(NAME, move |ctx: &mut PublishContext| {
                let this = Arc::clone(&this);
                Box::pin(async move { this.release(ctx).await })
            });

        tap_rollback!(hooks, self, NAME);
    }
}
