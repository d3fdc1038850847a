//! Changelog generation and persistence.
//!
//! Actions recorded:
//! - `changelog`: `{path, previousContent}`; `previousContent` is `null`
//!   when the file was created by the release.

use super::{Plugin, missing_field, step_outcome, tap_rollback};
use crate::changelog::{ChangelogEntry, update_file};
use crate::context::{ChangelogContext, RollbackContext};
use crate::conventional::BumpPreset;
use crate::error::Result;
use crate::hooks::Hooks;
use crate::journal::ActionEntry;
use crate::rollback::StepOutcome;
use chrono::Utc;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const NAME: &str = "changelog";

/// Builds per-package changelog sections and prepends them to CHANGELOG files.
#[derive(Debug, Clone, Default)]
pub struct ChangelogPlugin {
    preset: BumpPreset,
}

impl ChangelogPlugin {
    /// Group commits with `preset`.
    #[must_use]
    pub const fn new(preset: BumpPreset) -> Self {
        Self { preset }
    }

    fn generate(&self, ctx: &ChangelogContext, previous: String) -> String {
        let Some(package) = ctx.current_package.as_ref() else {
            return previous;
        };
        let Some(version) = ctx.version_of(&package.name) else {
            return previous;
        };
        let entry = ChangelogEntry::from_commits(
            version,
            Utc::now(),
            ctx.commits_for(&package.name),
            &self.preset,
        );
        previous + &entry.to_markdown(ctx.config.changelog.include_commit_hash)
    }

    fn write(ctx: &ChangelogContext) -> Result<()> {
        for package in &ctx.changed_packages {
            let Some(text) = ctx.changelogs.get(&package.name).filter(|t| !t.is_empty()) else {
                continue;
            };
            let path = package.path.join(&ctx.config.changelog.path);

            if ctx.is_dry_run() {
                info!(package = %package.name, path = %path.display(), "Would update changelog");
                continue;
            }

            let previous = update_file(&path, text)?;
            ctx.record(
                NAME,
                "changelog",
                json!({
                    "path": path.to_string_lossy(),
                    "previousContent": previous,
                }),
            )?;
            info!(package = %package.name, path = %path.display(), "Updated changelog");
        }
        Ok(())
    }

    #[allow(clippy::unused_async)]
    async fn compensate(&self, entry: &ActionEntry, _ctx: &RollbackContext) -> StepOutcome {
        let Some(path) = entry.data_str("path") else {
            return missing_field(entry, "path");
        };
        let path = Path::new(path);
        let result = match entry.data.get("previousContent") {
            Some(Value::String(previous)) => std::fs::write(path, previous),
            _ if path.exists() => std::fs::remove_file(path),
            _ => Ok(()),
        };
        step_outcome(entry, result.map_err(Into::into))
    }
}

impl Plugin for ChangelogPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(self: Arc<Self>, hooks: &mut Hooks) {
        let this = Arc::clone(&self);
        hooks
            .generate_changelog
            .tap(NAME, move |ctx: &ChangelogContext, previous: String| {
                let text = this.generate(ctx, previous);
                Box::pin(async move { Ok(text) })
            });

        hooks
            .after_changelog
            .tap(NAME, |ctx: &mut ChangelogContext| {
                Box::pin(async move { Self::write(ctx) })
            });

        tap_rollback!(hooks, self, NAME);
    }
}
