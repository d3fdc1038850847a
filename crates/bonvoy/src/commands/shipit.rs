//! `bonvoy shipit`

use super::{Workspace, pipeline};
use bonvoy_release::ops::{GitOperations, SystemGit};
use bonvoy_release::{DryRun, Result, ShipItOptions, ShipItReport, VersionRequest};
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Options of one `shipit` invocation.
#[derive(Debug, Clone, Default)]
pub struct ShipItArgs {
    /// Preview only.
    pub dry_run: bool,
    /// Forced bump or version.
    pub force: Option<String>,
    /// Read commits after this ref instead of the last tag.
    pub since: Option<String>,
}

/// Execute the `shipit` command.
///
/// # Errors
///
/// Returns an error if the workspace cannot be loaded, the commit history
/// cannot be read, or a release stage fails.
pub async fn execute(path: &Path, args: &ShipItArgs) -> Result<ShipItReport> {
    let ws = Workspace::load(path)?;
    let git = Arc::new(SystemGit::new(&ws.root));

    let since = match &args.since {
        Some(since) => Some(since.clone()),
        None => git.get_last_tag().await?,
    };
    let commits = git.get_commits_since_tag(since.as_deref()).await?;
    info!(
        since = since.as_deref().unwrap_or("(start of history)"),
        commits = commits.len(),
        "Read commit history"
    );

    let bonvoy = pipeline(&ws, &git).await?;
    let mut options = ShipItOptions::new(&ws.root, ws.packages.clone(), commits)
        .with_config(ws.config.clone())
        .with_dry_run(DryRun::from(args.dry_run));
    if let Some(force) = &args.force {
        options = options.with_force(force.parse::<VersionRequest>()?);
    }

    bonvoy.ship_it(options).await
}

/// Human readable summary of a release.
#[must_use]
pub fn render(report: &ShipItReport) -> String {
    if report.is_empty() {
        return "No packages to release".to_string();
    }

    let mut out = String::new();
    let heading = if report.dry_run {
        "Would release"
    } else {
        "Released"
    };
    let _ = writeln!(out, "{heading}:");
    for change in &report.changed {
        let _ = writeln!(
            out,
            "  {} {} -> {} ({})",
            change.name, change.from, change.to, change.bump
        );
    }
    if !report.published.is_empty() {
        let _ = writeln!(out, "Published: {}", report.published.join(", "));
    }
    for (package, release) in &report.releases {
        let _ = writeln!(out, "Release {package}: {}", release.url);
    }
    if let Some(pr) = &report.pr {
        let _ = writeln!(out, "Pull request #{}: {}", pr.number, pr.url);
    }
    out.trim_end().to_string()
}
