//! The release driver.
//!
//! [`Bonvoy`] owns the hook pipeline, applies plugins in attachment order and
//! runs every stage of a release. When a stage fails after the release log
//! was started, everything recorded so far is rolled back before the stage
//! error is returned.

use crate::assign::assign_commits;
use crate::bump::VersionRequest;
use crate::config::{BonvoyConfig, DryRun};
use crate::context::{
    ChangelogContext, ConfigContext, Context, PrContext, PublishContext, ReleaseContext,
    StageContext, VersionContext,
};
use crate::error::Result;
use crate::hooks::{HookName, Hooks, TapInfo};
use crate::journal::{ActionJournal, PackageChange};
use crate::ops::{PullRequestInfo, ReleaseInfo};
use crate::package::{CommitRecord, Package};
use crate::plugins::Plugin;
use crate::rollback::{RollbackCoordinator, RollbackReport};
use crate::version::{VersionResolver, apply_versions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Inputs of one release run.
#[derive(Debug, Clone)]
pub struct ShipItOptions {
    /// Workspace root.
    pub root: PathBuf,
    /// Configuration before `modifyConfig`.
    pub config: BonvoyConfig,
    /// Workspace packages in discovery order.
    pub packages: Vec<Package>,
    /// Commits since the last release.
    pub commits: Vec<CommitRecord>,
    /// Dry-run flag.
    pub dry_run: DryRun,
    /// Bump or version applied to every package instead of `getVersion`.
    pub force: Option<VersionRequest>,
}

impl ShipItOptions {
    /// Options with default configuration and no forced bump.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, packages: Vec<Package>, commits: Vec<CommitRecord>) -> Self {
        Self {
            root: root.into(),
            config: BonvoyConfig::default(),
            packages,
            commits,
            dry_run: DryRun::No,
            force: None,
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: BonvoyConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dry-run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Force a bump or version for every package.
    #[must_use]
    pub fn with_force(mut self, force: VersionRequest) -> Self {
        self.force = Some(force);
        self
    }
}

/// A package released by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedPackage {
    /// Package name.
    pub name: String,
    /// Version before the release.
    pub from: String,
    /// Released version.
    pub to: String,
    /// Request that produced `to`.
    pub bump: VersionRequest,
}

/// Outcome of a release run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShipItReport {
    /// Released packages in discovery order.
    pub changed: Vec<ChangedPackage>,
    /// Generated changelog sections by package.
    pub changelogs: BTreeMap<String, String>,
    /// Packages published to the registry.
    pub published: Vec<String>,
    /// Hosted releases by package.
    pub releases: BTreeMap<String, ReleaseInfo>,
    /// The release pull request.
    pub pr: Option<PullRequestInfo>,
    /// Whether this was a preview.
    pub dry_run: bool,
}

impl ShipItReport {
    /// Whether nothing was released.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// A configured release pipeline.
#[derive(Default)]
pub struct Bonvoy {
    hooks: Hooks,
    plugins: Vec<&'static str>,
}

impl Bonvoy {
    /// A pipeline without plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a plugin; it taps its hooks immediately.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin.name());
        plugin.apply(&mut self.hooks);
        self
    }

    /// Names of attached plugins, in attachment order.
    #[must_use]
    pub fn plugins(&self) -> &[&'static str] {
        &self.plugins
    }

    /// The hook pipeline.
    #[must_use]
    pub const fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// The hook pipeline, for tapping custom handlers.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Handlers registered on `name`.
    #[must_use]
    pub fn taps(&self, name: HookName) -> Vec<TapInfo> {
        self.hooks.taps(name)
    }

    /// Run a release.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. If the release log had been started,
    /// recorded actions are rolled back first; the rollback outcome is logged
    /// and the stage error is still what this returns.
    pub async fn ship_it(&self, options: ShipItOptions) -> Result<ShipItReport> {
        let ShipItOptions {
            root,
            config,
            packages,
            mut commits,
            dry_run,
            force,
        } = options;

        let config_ctx = ConfigContext {
            root_path: root.clone(),
            dry_run,
        };
        let config = self.hooks.modify_config.call(&config_ctx, config).await?;

        assign_commits(&mut commits, &packages, &root);
        let mut base = Context::new(config, root, packages, commits, dry_run);

        self.hooks.before_ship_it.call(&mut base).await?;
        self.hooks.validate_repo.call(&mut base).await?;

        let rollback_base = base.clone();
        let mut version_ctx = VersionContext::new(base);
        VersionResolver::new(&self.hooks)
            .resolve(&mut version_ctx, force.as_ref())
            .await?;

        if version_ctx.changed_packages.is_empty() {
            info!("No packages to release");
            return Ok(ShipItReport {
                dry_run: dry_run.is_dry_run(),
                ..ShipItReport::default()
            });
        }

        let changed: Vec<ChangedPackage> = version_ctx
            .changed_packages
            .iter()
            .filter_map(|p| {
                Some(ChangedPackage {
                    name: p.name.clone(),
                    from: p.version.clone(),
                    to: version_ctx.versions.get(&p.name)?.clone(),
                    bump: version_ctx.bumps.get(&p.name)?.clone(),
                })
            })
            .collect();

        let journal = if dry_run.is_dry_run() {
            None
        } else {
            let changes = changed
                .iter()
                .map(|c| PackageChange {
                    name: c.name.clone(),
                    from: c.from.clone(),
                    to: c.to.clone(),
                })
                .collect();
            Some(Arc::new(ActionJournal::start(
                &version_ctx.root_path,
                &version_ctx.config,
                changes,
            )?))
        };
        version_ctx.context_mut().journal.clone_from(&journal);

        match self.run_stages(version_ctx).await {
            Ok(mut report) => {
                if let Some(journal) = &journal {
                    journal.complete()?;
                }
                report.changed = changed;
                report.dry_run = dry_run.is_dry_run();
                info!(packages = report.changed.len(), "Release complete");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Release failed");
                if let Some(journal) = &journal {
                    self.recover(journal, rollback_base).await;
                }
                Err(e)
            }
        }
    }

    async fn recover(&self, journal: &ActionJournal, base: Context) {
        info!(path = %journal.path().display(), "Rolling back recorded actions");
        match RollbackCoordinator::new(&self.hooks).run(journal, base).await {
            Ok(report) if report.has_warnings() => warn!(
                warnings = report.warnings().count(),
                "Rollback finished with warnings; run `bonvoy rollback` after fixing them"
            ),
            Ok(report) => info!(compensated = report.compensated(), "Rollback complete"),
            Err(e) => error!(error = %e, "Rollback failed"),
        }
    }

    async fn run_stages(&self, mut ctx: VersionContext) -> Result<ShipItReport> {
        let hooks = &self.hooks;

        hooks.version.call(&mut ctx).await?;
        apply_versions(&mut ctx);
        hooks.after_version.call(&mut ctx).await?;

        let mut ctx = ChangelogContext::new(ctx);
        hooks.before_changelog.call(&mut ctx).await?;
        for package in ctx.changed_packages.clone() {
            ctx.context_mut().current_package = Some(package.clone());
            let text = hooks.generate_changelog.call(&ctx, String::new()).await?;
            if !text.is_empty() {
                ctx.changelogs.insert(package.name, text);
            }
        }
        ctx.context_mut().current_package = None;
        hooks.after_changelog.call(&mut ctx).await?;

        let mut ctx = PublishContext::new(ctx);
        hooks.before_publish.call(&mut ctx).await?;
        hooks.publish.call(&mut ctx).await?;
        hooks.after_publish.call(&mut ctx).await?;

        let mut ctx = ReleaseContext::new(ctx);
        hooks.before_release.call(&mut ctx).await?;
        hooks.make_release.call(&mut ctx).await?;
        hooks.after_release.call(&mut ctx).await?;

        let mut report = ShipItReport {
            changelogs: ctx.changelogs.clone(),
            published: ctx.published_packages.clone(),
            releases: ctx.releases.clone(),
            ..ShipItReport::default()
        };

        if ctx.config.pull_request.enabled {
            let pr_config = ctx.config.pull_request.clone();
            let title = pr_config
                .title
                .replace("{packages}", &ctx.changed_names().join(", "));
            let body = ctx
                .changelogs
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n");

            let mut ctx = PrContext::new(ctx, pr_config.branch, pr_config.base, title, body);
            hooks.before_create_pr.call(&mut ctx).await?;
            hooks.create_pr.call(&mut ctx).await?;
            hooks.after_create_pr.call(&mut ctx).await?;
            report.pr = ctx.pr.clone();
        }

        Ok(report)
    }

    /// Roll back the release log under `base.root_path`.
    ///
    /// # Errors
    ///
    /// See [`RollbackCoordinator::rollback`].
    pub async fn rollback(&self, base: Context) -> Result<RollbackReport> {
        RollbackCoordinator::new(&self.hooks).rollback(base).await
    }
}
