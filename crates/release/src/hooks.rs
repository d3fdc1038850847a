//! The hook pipeline.
//!
//! Every release stage is a named hook. Plugins tap hooks while the pipeline
//! is being built; the driver later calls each hook once per stage. Handlers
//! always run one after another in the order they were tapped.
//!
//! Two disciplines exist:
//! - [`SeriesHook`]: every handler receives the same mutable context.
//! - [`WaterfallHook`]: every handler receives the value returned by the
//!   previous one, seeded by the caller.

use crate::bump::VersionRequest;
use crate::config::BonvoyConfig;
use crate::context::{
    ChangelogContext, ConfigContext, Context, PrContext, PublishContext, ReleaseContext,
    RollbackContext, VersionContext,
};
use crate::error::{Error, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Future returned by hook handlers.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

type SeriesHandler<C> = Box<dyn for<'a> Fn(&'a mut C) -> HookFuture<'a, ()> + Send + Sync>;
type WaterfallHandler<C, V> = Box<dyn for<'a> Fn(&'a C, V) -> HookFuture<'a, V> + Send + Sync>;

/// How a hook composes its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDiscipline {
    /// Handlers share one mutable context; return values are discarded.
    Series,
    /// Each handler transforms the previous handler's value.
    Waterfall,
}

/// The fixed set of extension points, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookName {
    /// Transform the loaded configuration.
    ModifyConfig,
    /// Before anything else runs.
    BeforeShipIt,
    /// Check the repository is releasable.
    ValidateRepo,
    /// Decide the version request for the current package.
    GetVersion,
    /// Write new versions.
    Version,
    /// After versions are written into the package records.
    AfterVersion,
    /// Before changelogs are generated.
    BeforeChangelog,
    /// Produce the changelog text for the current package.
    GenerateChangelog,
    /// Persist generated changelogs.
    AfterChangelog,
    /// Before publishing (release commit and tags).
    BeforePublish,
    /// Publish packages.
    Publish,
    /// After publishing.
    AfterPublish,
    /// Before hosted releases are created.
    BeforeRelease,
    /// Create hosted releases.
    MakeRelease,
    /// After hosted releases.
    AfterRelease,
    /// Before the release pull request.
    BeforeCreatePr,
    /// Open the release pull request.
    CreatePr,
    /// After the release pull request.
    AfterCreatePr,
    /// Compensate recorded actions.
    Rollback,
}

impl HookName {
    /// Every hook, in pipeline order.
    pub const ALL: [Self; 19] = [
        Self::ModifyConfig,
        Self::BeforeShipIt,
        Self::ValidateRepo,
        Self::GetVersion,
        Self::Version,
        Self::AfterVersion,
        Self::BeforeChangelog,
        Self::GenerateChangelog,
        Self::AfterChangelog,
        Self::BeforePublish,
        Self::Publish,
        Self::AfterPublish,
        Self::BeforeRelease,
        Self::MakeRelease,
        Self::AfterRelease,
        Self::BeforeCreatePr,
        Self::CreatePr,
        Self::AfterCreatePr,
        Self::Rollback,
    ];

    /// The camelCase name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ModifyConfig => "modifyConfig",
            Self::BeforeShipIt => "beforeShipIt",
            Self::ValidateRepo => "validateRepo",
            Self::GetVersion => "getVersion",
            Self::Version => "version",
            Self::AfterVersion => "afterVersion",
            Self::BeforeChangelog => "beforeChangelog",
            Self::GenerateChangelog => "generateChangelog",
            Self::AfterChangelog => "afterChangelog",
            Self::BeforePublish => "beforePublish",
            Self::Publish => "publish",
            Self::AfterPublish => "afterPublish",
            Self::BeforeRelease => "beforeRelease",
            Self::MakeRelease => "makeRelease",
            Self::AfterRelease => "afterRelease",
            Self::BeforeCreatePr => "beforeCreatePR",
            Self::CreatePr => "createPR",
            Self::AfterCreatePr => "afterCreatePR",
            Self::Rollback => "rollback",
        }
    }

    /// Composition discipline of this hook.
    #[must_use]
    pub const fn discipline(self) -> HookDiscipline {
        match self {
            Self::ModifyConfig | Self::GetVersion | Self::GenerateChangelog => {
                HookDiscipline::Waterfall
            }
            _ => HookDiscipline::Series,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration metadata of one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapInfo {
    /// Plugin that registered the handler.
    pub plugin: String,
    /// Position among the hook's handlers.
    pub ordinal: usize,
}

struct Tap<H> {
    plugin: String,
    ordinal: usize,
    handler: H,
}

impl<H> Tap<H> {
    fn info(&self) -> TapInfo {
        TapInfo {
            plugin: self.plugin.clone(),
            ordinal: self.ordinal,
        }
    }
}

/// A hook whose handlers share one mutable context.
pub struct SeriesHook<C> {
    name: HookName,
    taps: Vec<Tap<SeriesHandler<C>>>,
}

impl<C: Send> SeriesHook<C> {
    /// Create an empty hook.
    #[must_use]
    pub const fn new(name: HookName) -> Self {
        Self {
            name,
            taps: Vec::new(),
        }
    }

    /// Register a handler after all existing ones.
    pub fn tap<F>(&mut self, plugin: impl Into<String>, handler: F)
    where
        F: for<'a> Fn(&'a mut C) -> HookFuture<'a, ()> + Send + Sync + 'static,
    {
        let ordinal = self.taps.len();
        self.taps.push(Tap {
            plugin: plugin.into(),
            ordinal,
            handler: Box::new(handler),
        });
    }

    /// Run every handler in registration order.
    ///
    /// # Errors
    ///
    /// The first failing handler stops the hook; its error is wrapped in
    /// [`Error::Stage`] and later handlers do not run.
    pub async fn call(&self, ctx: &mut C) -> Result<()> {
        for tap in &self.taps {
            debug!(hook = %self.name, plugin = %tap.plugin, "Running handler");
            (tap.handler)(&mut *ctx)
                .await
                .map_err(|e| Error::stage(self.name.as_str(), tap.plugin.as_str(), e))?;
        }
        Ok(())
    }

    /// Registered handlers.
    #[must_use]
    pub fn taps(&self) -> Vec<TapInfo> {
        self.taps.iter().map(Tap::info).collect()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Hook name.
    #[must_use]
    pub const fn name(&self) -> HookName {
        self.name
    }
}

/// A hook that threads a value through its handlers.
pub struct WaterfallHook<C, V> {
    name: HookName,
    taps: Vec<Tap<WaterfallHandler<C, V>>>,
}

impl<C: Sync, V: Send> WaterfallHook<C, V> {
    /// Create an empty hook.
    #[must_use]
    pub const fn new(name: HookName) -> Self {
        Self {
            name,
            taps: Vec::new(),
        }
    }

    /// Register a handler after all existing ones.
    pub fn tap<F>(&mut self, plugin: impl Into<String>, handler: F)
    where
        F: for<'a> Fn(&'a C, V) -> HookFuture<'a, V> + Send + Sync + 'static,
    {
        let ordinal = self.taps.len();
        self.taps.push(Tap {
            plugin: plugin.into(),
            ordinal,
            handler: Box::new(handler),
        });
    }

    /// Thread `seed` through every handler; an empty hook returns it as is.
    ///
    /// # Errors
    ///
    /// The first failing handler stops the hook and its error is wrapped in
    /// [`Error::Stage`].
    pub async fn call(&self, ctx: &C, seed: V) -> Result<V> {
        let mut value = seed;
        for tap in &self.taps {
            debug!(hook = %self.name, plugin = %tap.plugin, "Running handler");
            value = (tap.handler)(ctx, value)
                .await
                .map_err(|e| Error::stage(self.name.as_str(), tap.plugin.as_str(), e))?;
        }
        Ok(value)
    }

    /// Registered handlers.
    #[must_use]
    pub fn taps(&self) -> Vec<TapInfo> {
        self.taps.iter().map(Tap::info).collect()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Hook name.
    #[must_use]
    pub const fn name(&self) -> HookName {
        self.name
    }
}

/// The full hook surface of one pipeline.
pub struct Hooks {
    /// Transform the configuration before anything runs.
    pub modify_config: WaterfallHook<ConfigContext, BonvoyConfig>,
    /// Run first, with the loaded packages.
    pub before_ship_it: SeriesHook<Context>,
    /// Reject an unreleasable repository.
    pub validate_repo: SeriesHook<Context>,
    /// Per package; seeded with `None`.
    pub get_version: WaterfallHook<VersionContext, Option<VersionRequest>>,
    /// Write new versions to manifests.
    pub version: SeriesHook<VersionContext>,
    /// Observe the versions applied to packages.
    pub after_version: SeriesHook<VersionContext>,
    /// Prepare changelog generation.
    pub before_changelog: SeriesHook<ChangelogContext>,
    /// Per changed package; seeded with an empty string.
    pub generate_changelog: WaterfallHook<ChangelogContext, String>,
    /// Persist generated changelogs.
    pub after_changelog: SeriesHook<ChangelogContext>,
    /// Release commit and tags.
    pub before_publish: SeriesHook<PublishContext>,
    /// Publish packages to registries.
    pub publish: SeriesHook<PublishContext>,
    /// Observe published packages.
    pub after_publish: SeriesHook<PublishContext>,
    /// Prepare hosted releases.
    pub before_release: SeriesHook<ReleaseContext>,
    /// Create hosted releases.
    pub make_release: SeriesHook<ReleaseContext>,
    /// Observe hosted releases.
    pub after_release: SeriesHook<ReleaseContext>,
    /// Prepare the release pull request.
    pub before_create_pr: SeriesHook<PrContext>,
    /// Open the release pull request.
    pub create_pr: SeriesHook<PrContext>,
    /// Observe the release pull request.
    pub after_create_pr: SeriesHook<PrContext>,
    /// Called once per recorded action, newest first.
    pub rollback: SeriesHook<RollbackContext>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

impl Hooks {
    /// Create a pipeline with no handlers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modify_config: WaterfallHook::new(HookName::ModifyConfig),
            before_ship_it: SeriesHook::new(HookName::BeforeShipIt),
            validate_repo: SeriesHook::new(HookName::ValidateRepo),
            get_version: WaterfallHook::new(HookName::GetVersion),
            version: SeriesHook::new(HookName::Version),
            after_version: SeriesHook::new(HookName::AfterVersion),
            before_changelog: SeriesHook::new(HookName::BeforeChangelog),
            generate_changelog: WaterfallHook::new(HookName::GenerateChangelog),
            after_changelog: SeriesHook::new(HookName::AfterChangelog),
            before_publish: SeriesHook::new(HookName::BeforePublish),
            publish: SeriesHook::new(HookName::Publish),
            after_publish: SeriesHook::new(HookName::AfterPublish),
            before_release: SeriesHook::new(HookName::BeforeRelease),
            make_release: SeriesHook::new(HookName::MakeRelease),
            after_release: SeriesHook::new(HookName::AfterRelease),
            before_create_pr: SeriesHook::new(HookName::BeforeCreatePr),
            create_pr: SeriesHook::new(HookName::CreatePr),
            after_create_pr: SeriesHook::new(HookName::AfterCreatePr),
            rollback: SeriesHook::new(HookName::Rollback),
        }
    }

    /// Handlers registered on `name`.
    #[must_use]
    pub fn taps(&self, name: HookName) -> Vec<TapInfo> {
        match name {
            HookName::ModifyConfig => self.modify_config.taps(),
            HookName::BeforeShipIt => self.before_ship_it.taps(),
            HookName::ValidateRepo => self.validate_repo.taps(),
            HookName::GetVersion => self.get_version.taps(),
            HookName::Version => self.version.taps(),
            HookName::AfterVersion => self.after_version.taps(),
            HookName::BeforeChangelog => self.before_changelog.taps(),
            HookName::GenerateChangelog => self.generate_changelog.taps(),
            HookName::AfterChangelog => self.after_changelog.taps(),
            HookName::BeforePublish => self.before_publish.taps(),
            HookName::Publish => self.publish.taps(),
            HookName::AfterPublish => self.after_publish.taps(),
            HookName::BeforeRelease => self.before_release.taps(),
            HookName::MakeRelease => self.make_release.taps(),
            HookName::AfterRelease => self.after_release.taps(),
            HookName::BeforeCreatePr => self.before_create_pr.taps(),
            HookName::CreatePr => self.create_pr.taps(),
            HookName::AfterCreatePr => self.after_create_pr.taps(),
            HookName::Rollback => self.rollback.taps(),
        }
    }
}
