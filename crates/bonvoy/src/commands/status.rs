//! `bonvoy status`

use super::{Workspace, pipeline};
use bonvoy_release::ops::SystemGit;
use bonvoy_release::{ActionJournal, HookName, ReleaseLog, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

/// State of the workspace's release log and pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    /// The last release log, if any.
    pub release_log: Option<LogSummary>,
    /// Attached plugins in attachment order.
    pub plugins: Vec<String>,
    /// Plugins tapped on each hook, in execution order. Hooks without
    /// handlers are omitted.
    pub hooks: BTreeMap<String, Vec<String>>,
}

/// Summary of a release log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    /// Lifecycle status.
    pub status: String,
    /// When the run started (RFC 3339).
    pub started_at: String,
    /// `name@from -> to` per released package.
    pub packages: Vec<String>,
    /// Number of recorded actions.
    pub actions: usize,
}

impl From<&ReleaseLog> for LogSummary {
    fn from(log: &ReleaseLog) -> Self {
        Self {
            status: log.status.to_string(),
            started_at: log.started_at.to_rfc3339(),
            packages: log
                .packages
                .iter()
                .map(|p| format!("{}@{} -> {}", p.name, p.from, p.to))
                .collect(),
            actions: log.actions.len(),
        }
    }
}

/// Execute the `status` command.
///
/// # Errors
///
/// Returns an error if the workspace or the release log cannot be read.
pub async fn execute(path: &Path) -> Result<StatusOutput> {
    let ws = Workspace::load(path)?;
    let git = Arc::new(SystemGit::new(&ws.root));
    let bonvoy = pipeline(&ws, &git).await?;

    let hooks = HookName::ALL
        .iter()
        .filter_map(|name| {
            let taps = bonvoy.taps(*name);
            (!taps.is_empty()).then(|| {
                (
                    name.as_str().to_string(),
                    taps.into_iter().map(|t| t.plugin).collect(),
                )
            })
        })
        .collect();

    Ok(StatusOutput {
        release_log: ActionJournal::load(&ws.root)?.as_ref().map(LogSummary::from),
        plugins: bonvoy.plugins().iter().map(|p| (*p).to_string()).collect(),
        hooks,
    })
}

/// Human readable status.
#[must_use]
pub fn render(status: &StatusOutput) -> String {
    let mut out = String::new();
    match &status.release_log {
        Some(log) => {
            let _ = writeln!(out, "Release log: {} (started {})", log.status, log.started_at);
            for package in &log.packages {
                let _ = writeln!(out, "  {package}");
            }
            let _ = writeln!(out, "  {} recorded action(s)", log.actions);
        }
        None => {
            let _ = writeln!(out, "No release log");
        }
    }
    let _ = writeln!(out, "Plugins: {}", status.plugins.join(", "));
    for (hook, plugins) in &status.hooks {
        let _ = writeln!(out, "  {hook}: {}", plugins.join(", "));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_log() {
        let status = StatusOutput {
            release_log: None,
            plugins: vec!["conventional".into(), "npm".into()],
            hooks: BTreeMap::from([
                ("getVersion".to_string(), vec!["conventional".to_string()]),
                ("publish".to_string(), vec!["npm".to_string()]),
            ]),
        };
        assert_eq!(
            render(&status),
            "No release log\nPlugins: conventional, npm\n  getVersion: conventional\n  publish: npm"
        );
    }

    #[test]
    fn test_render_with_log() {
        let status = StatusOutput {
            release_log: Some(LogSummary {
                status: "rollback-failed".into(),
                started_at: "2026-01-01T00:00:00+00:00".into(),
                packages: vec!["core@1.0.0 -> 1.1.0".into()],
                actions: 3,
            }),
            plugins: Vec::new(),
            hooks: BTreeMap::new(),
        };
        let text = render(&status);
        assert!(text.starts_with("Release log: rollback-failed"));
        assert!(text.contains("core@1.0.0 -> 1.1.0"));
        assert!(text.contains("3 recorded action(s)"));
    }
}
