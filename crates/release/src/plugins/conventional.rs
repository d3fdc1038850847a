//! Bump detection from conventional commits.

use super::Plugin;
use crate::bump::VersionRequest;
use crate::context::VersionContext;
use crate::conventional::BumpPreset;
use crate::hooks::Hooks;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "conventional";

/// Answers `getVersion` with the strongest bump among the package's commits.
#[derive(Debug, Clone, Default)]
pub struct ConventionalPlugin {
    preset: BumpPreset,
}

impl ConventionalPlugin {
    /// Classify commits with `preset`.
    #[must_use]
    pub const fn new(preset: BumpPreset) -> Self {
        Self { preset }
    }

    fn request_for(&self, ctx: &VersionContext) -> Option<VersionRequest> {
        let package = ctx.current_package.as_ref()?;
        let severity = self.preset.aggregate(
            ctx.commits_for(&package.name)
                .map(|commit| commit.message.as_str()),
        );
        debug!(package = %package.name, bump = %severity, "Classified commits");
        Some(VersionRequest::Bump(severity))
    }
}

impl Plugin for ConventionalPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(self: Arc<Self>, hooks: &mut Hooks) {
        hooks.get_version.tap(
            NAME,
            move |ctx: &VersionContext, previous: Option<VersionRequest>| {
                let request = self.request_for(ctx);
                Box::pin(async move {
                    Ok(match (previous, request) {
                        (Some(previous), Some(request)) => Some(previous.max(request)),
                        (previous, request) => previous.or(request),
                    })
                })
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bump::BumpSeverity;
    use crate::config::{BonvoyConfig, DryRun};
    use crate::context::{Context, StageContext};
    use crate::package::{CommitRecord, Package};
    use chrono::Utc;

    fn ctx(messages: &[&str]) -> VersionContext {
        let package = Package::new("@test/core", "1.0.0", "/repo/packages/core");
        let commits = messages
            .iter()
            .map(|m| {
                let mut c = CommitRecord::new("abc", *m, "dev", Utc::now(), Vec::new());
                c.packages.insert("@test/core".into());
                c
            })
            .collect();
        let mut ctx = VersionContext::new(Context::new(
            BonvoyConfig::default(),
            "/repo",
            vec![package.clone()],
            commits,
            DryRun::No,
        ));
        ctx.context_mut().current_package = Some(package);
        ctx
    }

    #[tokio::test]
    async fn test_highest_bump_wins() {
        let mut hooks = Hooks::new();
        Arc::new(ConventionalPlugin::default()).apply(&mut hooks);

        let request = hooks
            .get_version
            .call(&ctx(&["fix: a", "feat: b"]), None)
            .await
            .unwrap();
        assert_eq!(request, Some(VersionRequest::Bump(BumpSeverity::Minor)));
    }

    #[tokio::test]
    async fn test_combines_with_previous_value() {
        let mut hooks = Hooks::new();
        Arc::new(ConventionalPlugin::default()).apply(&mut hooks);

        let seeded = Some(VersionRequest::Bump(BumpSeverity::Major));
        let request = hooks
            .get_version
            .call(&ctx(&["fix: a"]), seeded)
            .await
            .unwrap();
        assert_eq!(request, Some(VersionRequest::Bump(BumpSeverity::Major)));
    }

    #[tokio::test]
    async fn test_no_relevant_commits() {
        let mut hooks = Hooks::new();
        Arc::new(ConventionalPlugin::default()).apply(&mut hooks);

        let request = hooks
            .get_version
            .call(&ctx(&["chore: a", "wip"]), None)
            .await
            .unwrap();
        assert_eq!(request, Some(VersionRequest::Bump(BumpSeverity::None)));
    }
}
