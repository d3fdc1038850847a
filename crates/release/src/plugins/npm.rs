//! Manifest version writes and npm publishing.
//!
//! Actions recorded:
//! - `manifest`: `{path, previousVersion}` where `path` is the package directory
//! - `publish`: `{name, version}`

use super::{Plugin, missing_field, step_outcome, tap_rollback};
use crate::context::{PublishContext, RollbackContext, StageContext, VersionContext};
use crate::error::Result;
use crate::hooks::Hooks;
use crate::journal::ActionEntry;
use crate::manifest::write_version;
use crate::ops::RegistryOperations;
use crate::package::Package;
use crate::retry::{RetryPolicy, with_retry};
use crate::rollback::StepOutcome;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "npm";

/// Writes versions into `package.json` and publishes to the registry.
pub struct NpmPlugin {
    registry: Arc<dyn RegistryOperations>,
}

impl NpmPlugin {
    /// Use `registry` for publishing.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryOperations>) -> Self {
        Self { registry }
    }

    fn write_manifests(ctx: &VersionContext) -> Result<()> {
        for package in &ctx.changed_packages {
            let Some(version) = ctx.version_of(&package.name) else {
                continue;
            };
            if ctx.is_dry_run() {
                info!(package = %package.name, version = %version, "Would write manifest version");
                continue;
            }
            let previous = write_version(&package.path, version)?;
            ctx.record(
                NAME,
                "manifest",
                json!({
                    "path": package.path.to_string_lossy(),
                    "previousVersion": previous,
                }),
            )?;
            debug!(package = %package.name, version = %version, "Wrote manifest version");
        }
        Ok(())
    }

    fn publish_args(ctx: &PublishContext, version: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(access) = &ctx.config.npm.access {
            args.extend(["--access".to_string(), access.clone()]);
        }
        if let Some(registry) = &ctx.config.npm.registry {
            args.extend(["--registry".to_string(), registry.clone()]);
        }
        if version.contains('-') {
            let tag = ctx.config.prerelease_id.as_deref().unwrap_or("next");
            args.extend(["--tag".to_string(), tag.to_string()]);
        }
        args
    }

    async fn publish_package(
        &self,
        ctx: &PublishContext,
        package: &Package,
        version: &str,
    ) -> Result<bool> {
        if package.private {
            debug!(package = %package.name, "Private package; not publishing");
            return Ok(false);
        }
        if ctx.is_dry_run() {
            info!(package = %package.name, version = %version, "Would publish");
            return Ok(false);
        }

        let policy = RetryPolicy::from(ctx.config.retry);
        if self.registry.view(&package.name, version).await?.is_some() {
            info!(package = %package.name, version = %version, "Already published; skipping");
            return Ok(false);
        }

        let args = Self::publish_args(ctx, version);
        with_retry(policy, "npm publish", || {
            self.registry.publish(&args, &package.path)
        })
        .await?;
        ctx.record(
            NAME,
            "publish",
            json!({ "name": package.name, "version": version }),
        )?;
        info!(package = %package.name, version = %version, "Published");
        Ok(true)
    }

    async fn publish_all(&self, ctx: &mut PublishContext) -> Result<()> {
        let changed = ctx.changed_packages.clone();
        for package in &changed {
            let Some(version) = ctx.version_of(&package.name).map(str::to_string) else {
                continue;
            };
            ctx.context_mut().current_package = Some(package.clone());
            if self.publish_package(ctx, package, &version).await? {
                ctx.published_packages.push(package.name.clone());
            }
        }
        ctx.context_mut().current_package = None;
        Ok(())
    }

    async fn compensate(&self, entry: &ActionEntry, _ctx: &RollbackContext) -> StepOutcome {
        match entry.action.as_str() {
            "manifest" => {
                let Some(path) = entry.data_str("path") else {
                    return missing_field(entry, "path");
                };
                let Some(previous) = entry.data_str("previousVersion") else {
                    return StepOutcome::Skipped("manifest had no previous version".to_string());
                };
                step_outcome(entry, write_version(Path::new(path), previous).map(drop))
            }
            "publish" => {
                let (Some(name), Some(version)) =
                    (entry.data_str("name"), entry.data_str("version"))
                else {
                    return missing_field(entry, "name/version");
                };
                step_outcome(entry, self.registry.unpublish(name, version).await)
            }
            other => StepOutcome::Skipped(format!("unknown npm action '{other}'")),
        }
    }
}

impl Plugin for NpmPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.version.tap(NAME, |ctx: &mut VersionContext| {
            Box::pin(async move { Self::write_manifests(ctx) })
        });

        let this = Arc::clone(&self);
        hooks.publish.tap(NAME, move |ctx: &mut PublishContext| {
            let this = Arc::clone(&this);
            Box::pin(async move { this.publish_all(ctx).await })
        });

        tap_rollback!(hooks, self, NAME);
    }
}
