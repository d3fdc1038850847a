//! Error types for release pipeline operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running or recovering a release.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// An explicit target version did not follow semantic versioning.
    #[error("Invalid version: {version}")]
    #[diagnostic(
        code(bonvoy::release::invalid_version),
        help("Version must follow semantic versioning (e.g., 1.0.0, 2.1.0-beta.1)")
    )]
    InvalidVersion {
        /// The invalid version string
        version: String,
    },

    /// Configuration error.
    #[error("Release configuration error: {message}")]
    #[diagnostic(code(bonvoy::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Manifest file error (package.json).
    #[error("Manifest error: {message}")]
    #[diagnostic(
        code(bonvoy::release::manifest),
        help("Check that the manifest file exists and is valid JSON")
    )]
    Manifest {
        /// The error message
        message: String,
        /// The manifest file path
        path: Option<PathBuf>,
    },

    /// No release log exists for the workspace.
    #[error("No release log found at {}", path.display())]
    #[diagnostic(
        code(bonvoy::release::no_release_log),
        help("Rollback needs the log written by a previous `bonvoy shipit` run")
    )]
    NoReleaseLog {
        /// Expected location of the log
        path: PathBuf,
    },

    /// A previous run left a release log that still needs recovery.
    #[error("Release log at {} is '{status}'; refusing to start a new release", path.display())]
    #[diagnostic(
        code(bonvoy::release::unresolved_release),
        help("Run `bonvoy rollback` to recover the previous release first")
    )]
    UnresolvedRelease {
        /// Location of the log
        path: PathBuf,
        /// Status read from disk
        status: String,
    },

    /// The release log carries a status rollback does not know how to handle.
    #[error("Release log has unrecognized status '{status}'")]
    #[diagnostic(
        code(bonvoy::release::unrecognized_status),
        help("Inspect .bonvoy/release-log.json and revert the release manually")
    )]
    UnrecognizedReleaseStatus {
        /// The status read from disk
        status: String,
    },

    /// A status change that the release log state machine forbids.
    #[error("Cannot move release log from '{from}' to '{to}'")]
    #[diagnostic(code(bonvoy::release::invalid_transition))]
    InvalidStatusTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// An action was recorded after the release log left `in-progress`.
    #[error("Release log is '{status}'; no further actions can be recorded")]
    #[diagnostic(code(bonvoy::release::journal_closed))]
    JournalClosed {
        /// Current status
        status: String,
    },

    /// A hook handler failed, aborting its stage.
    #[error("Hook '{hook}' failed in plugin '{plugin}': {source}")]
    #[diagnostic(code(bonvoy::release::stage))]
    Stage {
        /// The hook being executed
        hook: String,
        /// The plugin whose handler failed
        plugin: String,
        /// The handler's error
        #[source]
        source: Box<Error>,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(bonvoy::release::git),
        help("Ensure you are in a git repository and have the necessary permissions")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// External process failure (npm, git binaries).
    #[error("Command `{command}` failed: {message}")]
    #[diagnostic(code(bonvoy::release::process))]
    Process {
        /// The command that was run
        command: String,
        /// stderr or spawn failure
        message: String,
    },

    /// Publish error.
    #[error("Publish failed: {message}")]
    #[diagnostic(code(bonvoy::release::publish))]
    Publish {
        /// The error message
        message: String,
        /// The package that failed to publish
        package: Option<String>,
    },

    /// Outbound HTTP failure from a hosting provider.
    #[error("{backend} request failed: {message}")]
    #[diagnostic(code(bonvoy::release::http))]
    Http {
        /// The provider (e.g. "github")
        backend: String,
        /// HTTP status code, when one was received
        status: Option<u16>,
        /// The error message
        message: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(bonvoy::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(bonvoy::release::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new manifest error.
    #[must_use]
    pub fn manifest(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Manifest {
            message: message.into(),
            path,
        }
    }

    /// Wrap a handler failure with the hook and plugin it came from.
    #[must_use]
    pub fn stage(hook: impl Into<String>, plugin: impl Into<String>, source: Self) -> Self {
        Self::Stage {
            hook: hook.into(),
            plugin: plugin.into(),
            source: Box::new(source),
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a new process error.
    #[must_use]
    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a new publish error.
    #[must_use]
    pub fn publish(message: impl Into<String>, package: Option<String>) -> Self {
        Self::Publish {
            message: message.into(),
            package,
        }
    }

    /// Create a new HTTP error.
    #[must_use]
    pub fn http(backend: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http {
            backend: backend.into(),
            status,
            message: message.into(),
        }
    }

    /// The innermost error, looking through stage wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
