//! Release pipeline and recovery engine for bonvoy.
//!
//! This crate computes semantic version bumps from commit history, drives
//! pluggable release stages through a fixed hook pipeline, and keeps an
//! append-only journal of every side effect so a failed release can be
//! rolled back.
//!
//! # Architecture
//!
//! - [`conventional`] - Conventional commit parsing and bump presets
//! - [`assign`] - Path-based commit-to-package attribution
//! - [`hooks`] - Series and waterfall hooks, the [`Hooks`] surface
//! - [`context`] - Stage contexts handed to hook handlers
//! - [`version`] - Version increments and the `getVersion` resolver
//! - [`journal`] - The persisted release log and its status machine
//! - [`rollback`] - Reverse replay of the release log
//! - [`shipit`] - The [`Bonvoy`] driver running a whole release
//! - [`plugins`] - Built-in plugins (conventional, changelog, git, npm, github)
//! - [`ops`] - Collaborator traits for git, registries and hosting providers
//!
//! # Example
//!
//! ```rust,ignore
//! use bonvoy_release::{Bonvoy, ShipItOptions, workspace};
//! use bonvoy_release::plugins::{ChangelogPlugin, ConventionalPlugin};
//! use std::sync::Arc;
//!
//! let bonvoy = Bonvoy::new()
//!     .with_plugin(Arc::new(ConventionalPlugin::default()))
//!     .with_plugin(Arc::new(ChangelogPlugin::default()));
//!
//! let packages = workspace::load_packages(root)?;
//! let report = bonvoy.ship_it(ShipItOptions::new(root, packages, commits)).await?;
//! ```

#![warn(missing_docs)]

pub mod assign;
pub mod bump;
pub mod changelog;
pub mod config;
pub mod context;
pub mod conventional;
pub mod error;
pub mod hooks;
pub mod journal;
pub mod manifest;
pub mod ops;
pub mod package;
pub mod plugins;
pub mod retry;
pub mod rollback;
pub mod shipit;
pub mod version;
pub mod workspace;

// Re-export main types
pub use bump::{BumpSeverity, VersionRequest};
pub use config::{BonvoyConfig, DryRun};
pub use context::{
    ChangelogContext, ConfigContext, Context, PrContext, PublishContext, ReleaseContext,
    RollbackContext, StageContext, VersionContext,
};
pub use conventional::{BumpPreset, CommitDescriptor, parse_commit_message};
pub use error::{Error, Result};
pub use hooks::{HookDiscipline, HookFuture, HookName, Hooks, SeriesHook, TapInfo, WaterfallHook};
pub use journal::{ActionEntry, ActionJournal, ReleaseLog, ReleaseStatus};
pub use package::{CommitRecord, Package};
pub use plugins::Plugin;
pub use rollback::{RollbackCoordinator, RollbackReport, RollbackStep, StepOutcome};
pub use shipit::{Bonvoy, ChangedPackage, ShipItOptions, ShipItReport};
pub use version::{Resolution, VersionResolver, next_version};
