//! Command line definition.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// Exit code for a failed command.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a rollback that finished with warnings.
pub const EXIT_ROLLBACK_WARNINGS: i32 = 2;

/// Release tool for JavaScript monorepos.
#[derive(Parser, Debug)]
#[command(name = "bonvoy")]
#[command(about = "Release tool for JavaScript monorepos")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root.
    #[arg(long, short = 'p', global = true, default_value = ".", help = "Workspace root")]
    pub path: PathBuf,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long = "log-level",
        global = true,
        default_value = "info",
        value_enum,
        help = "Set logging level"
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, default_value = "compact", value_enum, help = "Log output format")]
    pub log_format: TracingFormat,

    /// Print command output as JSON.
    #[arg(long, global = true, help = "Print command output as JSON")]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Release every package with releasable changes.
    #[command(name = "shipit", about = "Release every package with releasable changes")]
    ShipIt {
        /// Preview the release without side effects.
        #[arg(long, help = "Preview the release without side effects")]
        dry_run: bool,
        /// Bump (major, minor, patch, prerelease) or exact version for every package.
        #[arg(
            long,
            value_name = "BUMP|VERSION",
            help = "Bump (major, minor, patch, prerelease) or exact version for every package"
        )]
        force: Option<String>,
        /// Git tag or ref to read commits from (default: last tag).
        #[arg(long, help = "Git tag or ref to read commits from (default: last tag)")]
        since: Option<String>,
    },
    /// Undo the last release from its release log.
    #[command(about = "Undo the last release from its release log")]
    Rollback {
        /// List the compensating steps without running them.
        #[arg(long, help = "List the compensating steps without running them")]
        dry_run: bool,
    },
    /// Show the release log status and the configured pipeline.
    #[command(about = "Show the release log status and the configured pipeline")]
    Status,
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
