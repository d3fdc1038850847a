//! Built-in plugins.
//!
//! A plugin is applied once while the pipeline is built and taps the hooks
//! it needs. Plugins that cause side effects record them in the journal and
//! tap `rollback` to compensate their own entries.

mod changelog;
mod conventional;
mod git;
mod github;
mod npm;

pub use changelog::ChangelogPlugin;
pub use conventional::ConventionalPlugin;
pub use git::GitPlugin;
pub use github::GitHubPlugin;
pub use npm::NpmPlugin;

use crate::error::Result;
use crate::hooks::Hooks;
use crate::journal::ActionEntry;
use crate::rollback::StepOutcome;
use std::sync::Arc;
use tracing::warn;

/// A release pipeline extension.
pub trait Plugin: Send + Sync {
    /// Name recorded in the journal for this plugin's actions.
    fn name(&self) -> &'static str;

    /// Tap the hooks this plugin participates in.
    fn apply(self: Arc<Self>, hooks: &mut Hooks);
}

/// Turn a compensation result into a step outcome, logging failures.
pub(crate) fn step_outcome(entry: &ActionEntry, result: Result<()>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Compensated,
        Err(e) => {
            warn!(
                plugin = %entry.plugin,
                action = %entry.action,
                error = %e,
                "Compensating action failed; continuing rollback"
            );
            StepOutcome::Warning(e.to_string())
        }
    }
}

/// Outcome for an entry whose data lacks a required field.
pub(crate) fn missing_field(entry: &ActionEntry, field: &str) -> StepOutcome {
    warn!(
        plugin = %entry.plugin,
        action = %entry.action,
        field,
        "Recorded action is missing data; cannot compensate"
    );
    StepOutcome::Warning(format!("'{}' action has no '{field}'", entry.action))
}

/// Tap `rollback` so that `compensate` runs for every entry `plugin`
/// recorded.
macro_rules! tap_rollback {
    ($hooks:expr, $this:expr, $name:expr) => {{
        let this = ::std::sync::Arc::clone(&$this);
        $hooks
            .rollback
            .tap($name, move |ctx: &mut $crate::context::RollbackContext| {
                let this = ::std::sync::Arc::clone(&this);
                Box::pin(async move {
                    if let Some(entry) = ctx.current_for($name) {
                        let outcome = this.compensate(&entry, ctx).await;
                        ctx.push_outcome(&entry, outcome);
                    }
                    Ok(())
                })
            });
    }};
}

pub(crate) use tap_rollback;
