//! Rollback coordination.
//!
//! Rollback replays the release log newest first. For every recorded action
//! the `rollback` hook runs once with the context's cursor on that action;
//! the plugin that recorded it compensates and reports a [`StepOutcome`].
//! A failed compensation is a warning, never an error, so one stuck action
//! does not keep the others from being undone.

use crate::context::{Context, RollbackContext};
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use crate::journal::{ActionJournal, ReleaseStatus};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

/// Result of compensating one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The action was undone.
    Compensated,
    /// Nothing to undo.
    Skipped(String),
    /// Compensation failed; manual follow-up needed.
    Warning(String),
    /// Dry run: the action would be compensated.
    Planned,
}

impl StepOutcome {
    /// Whether this outcome needs operator attention.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compensated => write!(f, "compensated"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Warning(message) => write!(f, "warning: {message}"),
            Self::Planned => write!(f, "planned"),
        }
    }
}

/// Outcome for one recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackStep {
    /// Position of the action in the release log.
    pub index: usize,
    /// Plugin that recorded the action.
    pub plugin: String,
    /// Action kind.
    pub action: String,
    /// What happened.
    pub outcome: StepOutcome,
}

/// Summary of a rollback run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Steps in the order they were processed.
    pub steps: Vec<RollbackStep>,
    /// Release log status after the run.
    pub status: Option<ReleaseStatus>,
    /// Whether this was a preview.
    pub dry_run: bool,
}

impl RollbackReport {
    /// A report with no steps.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            steps: Vec::new(),
            status: None,
            dry_run: false,
        }
    }

    /// Steps that ended in a warning.
    pub fn warnings(&self) -> impl Iterator<Item = &RollbackStep> {
        self.steps.iter().filter(|s| s.outcome.is_warning())
    }

    /// Whether any step ended in a warning.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Number of compensated actions.
    #[must_use]
    pub fn compensated(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Compensated)
            .count()
    }
}

/// Replays a release log through the `rollback` hook.
pub struct RollbackCoordinator<'h> {
    hooks: &'h Hooks,
}

impl<'h> RollbackCoordinator<'h> {
    /// Create a coordinator over a hook set.
    #[must_use]
    pub const fn new(hooks: &'h Hooks) -> Self {
        Self { hooks }
    }

    /// Roll back the release log stored under `base.root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReleaseLog`] when there is nothing to roll back,
    /// plus every error of [`Self::run`].
    pub async fn rollback(&self, base: Context) -> Result<RollbackReport> {
        let journal = ActionJournal::open(&base.root_path)?;
        self.run(&journal, base).await
    }

    /// Roll back the actions of `journal`.
    ///
    /// - `rolled-back`: nothing happens.
    /// - unrecognized status: fails without compensating anything.
    /// - dry run: every action is reported as planned, newest first; the log
    ///   is not touched.
    /// - otherwise the log ends `rolled-back`, or `rollback-failed` when any
    ///   step produced a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedReleaseStatus`] for unknown statuses, or
    /// the hook's error after marking the log `rollback-failed`.
    pub async fn run(&self, journal: &ActionJournal, mut base: Context) -> Result<RollbackReport> {
        let status = journal.status();
        match &status {
            ReleaseStatus::RolledBack => {
                info!("Release already rolled back; nothing to do");
                return Ok(RollbackReport {
                    status: Some(status),
                    dry_run: base.is_dry_run(),
                    ..RollbackReport::empty()
                });
            }
            ReleaseStatus::Unrecognized(raw) => {
                return Err(Error::UnrecognizedReleaseStatus {
                    status: raw.clone(),
                });
            }
            ReleaseStatus::InProgress | ReleaseStatus::Completed | ReleaseStatus::RollbackFailed => {}
        }

        let actions = journal.snapshot().actions;
        // Compensations must never be journaled themselves.
        base.journal = None;

        if base.is_dry_run() {
            let steps = actions
                .iter()
                .enumerate()
                .rev()
                .map(|(index, a)| RollbackStep {
                    index,
                    plugin: a.plugin.clone(),
                    action: a.action.clone(),
                    outcome: StepOutcome::Planned,
                })
                .collect();
            return Ok(RollbackReport {
                steps,
                status: Some(status),
                dry_run: true,
            });
        }

        info!(actions = actions.len(), from = %status, "Rolling back release");
        let mut ctx = RollbackContext::new(base, actions);

        for index in (0..ctx.actions.len()).rev() {
            ctx.cursor = Some(index);
            if let Err(e) = self.hooks.rollback.call(&mut ctx).await {
                error!(error = %e, index, "Rollback hook failed");
                if let Err(te) = journal.transition(ReleaseStatus::RollbackFailed) {
                    warn!(error = %te, "Could not mark release log rollback-failed");
                }
                return Err(e);
            }

            if !ctx.current_handled() {
                let entry = ctx.actions[index].clone();
                warn!(
                    plugin = %entry.plugin,
                    action = %entry.action,
                    "No plugin compensated this action"
                );
                ctx.push_outcome(
                    &entry,
                    StepOutcome::Warning(format!(
                        "no plugin registered to compensate '{}' from '{}'",
                        entry.action, entry.plugin
                    )),
                );
            }
        }
        ctx.cursor = None;

        let target = if ctx.report.has_warnings() {
            ReleaseStatus::RollbackFailed
        } else {
            ReleaseStatus::RolledBack
        };
        journal.transition(target.clone())?;

        let mut report = ctx.report;
        if target == ReleaseStatus::RollbackFailed {
            warn!(
                warnings = report.warnings().count(),
                "Rollback finished with warnings; manual follow-up required"
            );
        } else {
            info!(compensated = report.compensated(), "Rollback complete");
        }
        report.status = Some(target);
        Ok(report)
    }
}
