//! `bonvoy rollback`

use super::{Workspace, pipeline};
use bonvoy_release::ops::SystemGit;
use bonvoy_release::{DryRun, Result, RollbackReport};
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

/// Execute the `rollback` command.
///
/// # Errors
///
/// Returns an error if there is no release log, its status is unknown, or a
/// rollback handler fails. Compensations that fail are reported as warnings.
pub async fn execute(path: &Path, dry_run: bool) -> Result<RollbackReport> {
    let ws = Workspace::load(path)?;
    let git = Arc::new(SystemGit::new(&ws.root));
    let bonvoy = pipeline(&ws, &git).await?;
    bonvoy.rollback(ws.context(DryRun::from(dry_run))).await
}

/// Human readable summary of a rollback.
#[must_use]
pub fn render(report: &RollbackReport) -> String {
    let mut out = String::new();
    if report.steps.is_empty() {
        let _ = write!(out, "Nothing to roll back");
        if let Some(status) = &report.status {
            let _ = write!(out, " (release log is {status})");
        }
        return out;
    }

    let heading = if report.dry_run {
        "Would roll back"
    } else {
        "Rolled back"
    };
    let _ = writeln!(out, "{heading}:");
    for step in &report.steps {
        let _ = writeln!(
            out,
            "  #{} {}:{} {}",
            step.index, step.plugin, step.action, step.outcome
        );
    }
    if let Some(status) = &report.status {
        let _ = writeln!(out, "Release log: {status}");
    }
    if report.has_warnings() {
        let _ = writeln!(
            out,
            "{} step(s) need manual follow-up; fix them and run `bonvoy rollback` again",
            report.warnings().count()
        );
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonvoy_release::{ReleaseStatus, RollbackStep, StepOutcome};

    #[test]
    fn test_render_nothing_to_do() {
        let report = RollbackReport {
            status: Some(ReleaseStatus::RolledBack),
            ..RollbackReport::empty()
        };
        assert_eq!(render(&report), "Nothing to roll back (release log is rolled-back)");
    }

    #[test]
    fn test_render_warnings() {
        let report = RollbackReport {
            steps: vec![
                RollbackStep {
                    index: 1,
                    plugin: "git".into(),
                    action: "tag".into(),
                    outcome: StepOutcome::Warning("tag missing".into()),
                },
                RollbackStep {
                    index: 0,
                    plugin: "git".into(),
                    action: "commit".into(),
                    outcome: StepOutcome::Compensated,
                },
            ],
            status: Some(ReleaseStatus::RollbackFailed),
            dry_run: false,
        };
        let text = render(&report);
        assert!(text.starts_with("Rolled back:\n  #1 git:tag warning: tag missing"));
        assert!(text.contains("#0 git:commit compensated"));
        assert!(text.contains("Release log: rollback-failed"));
        assert!(text.ends_with("run `bonvoy rollback` again"));
    }
}
