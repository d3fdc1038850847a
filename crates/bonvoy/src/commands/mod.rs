//! Command implementations.
//!
//! Every command loads the workspace, builds the same plugin pipeline and
//! returns its rendered output; `main` prints it.

pub mod rollback;
pub mod shipit;
pub mod status;

use bonvoy_release::conventional::BumpPreset;
use bonvoy_release::ops::{NpmCli, SystemGit};
use bonvoy_release::plugins::{ChangelogPlugin, ConventionalPlugin, GitPlugin, NpmPlugin};
use bonvoy_release::{Bonvoy, BonvoyConfig, Context, DryRun, Package, Result, workspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A loaded workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Canonical workspace root.
    pub root: PathBuf,
    /// Configuration from `bonvoy.config.json`, or defaults.
    pub config: BonvoyConfig,
    /// Discovered packages.
    pub packages: Vec<Package>,
}

impl Workspace {
    /// Load configuration and packages under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist, or the configuration or
    /// a manifest is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let root = path.canonicalize()?;
        let config = BonvoyConfig::load(&root)?;
        let packages = workspace::load_packages(&root)?;
        debug!(root = %root.display(), packages = packages.len(), "Loaded workspace");
        Ok(Self {
            root,
            config,
            packages,
        })
    }

    /// Base context for rollback runs.
    #[must_use]
    pub fn context(&self, dry_run: DryRun) -> Context {
        Context::new(
            self.config.clone(),
            &self.root,
            self.packages.clone(),
            Vec::new(),
            dry_run,
        )
    }
}

/// Build the release pipeline with the built-in plugins.
///
/// Plugins are attached in a fixed order: conventional, changelog, npm, git,
/// github. The github plugin is only attached when credentials are available.
///
/// # Errors
///
/// Returns an error if the configured preset is invalid.
pub async fn pipeline(ws: &Workspace, git: &Arc<SystemGit>) -> Result<Bonvoy> {
    let preset = BumpPreset::from_config(&ws.config.preset)?;
    let npm = ws
        .config
        .npm
        .registry
        .as_ref()
        .map_or_else(NpmCli::new, |registry| NpmCli::new().with_registry(registry));

    let bonvoy = Bonvoy::new()
        .with_plugin(Arc::new(ConventionalPlugin::new(preset.clone())))
        .with_plugin(Arc::new(ChangelogPlugin::new(preset)))
        .with_plugin(Arc::new(NpmPlugin::new(Arc::new(npm))))
        .with_plugin(Arc::new(GitPlugin::new(git.clone())));

    Ok(with_hosting(bonvoy, ws, git).await)
}

#[cfg(feature = "github")]
async fn with_hosting(bonvoy: Bonvoy, ws: &Workspace, git: &SystemGit) -> Bonvoy {
    use bonvoy_github::{GitHubHosting, GitHubHostingConfig};
    use bonvoy_release::plugins::GitHubPlugin;

    let remote_url = match git.remote_url(&ws.config.git.remote).await {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Could not read git remote");
            None
        }
    };
    let Some(config) = GitHubHostingConfig::from_env(&ws.config, remote_url.as_deref()) else {
        warn!("GITHUB_TOKEN or repository unknown; GitHub releases disabled");
        return bonvoy;
    };

    match GitHubHosting::new(config) {
        Ok(hosting) => {
            debug!(repository = %hosting.repository(), "GitHub hosting enabled");
            bonvoy.with_plugin(Arc::new(GitHubPlugin::new(Arc::new(hosting))))
        }
        Err(e) => {
            warn!(error = %e, "GitHub client unavailable; GitHub releases disabled");
            bonvoy
        }
    }
}

#[cfg(not(feature = "github"))]
#[allow(clippy::unused_async)]
async fn with_hosting(bonvoy: Bonvoy, _ws: &Workspace, _git: &SystemGit) -> Bonvoy {
    bonvoy
}
