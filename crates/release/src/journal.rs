//! Durable, append-only record of the side effects of a release run.
//!
//! The log lives at `<root>/.bonvoy/release-log.json` and is rewritten after
//! every mutation. Writes go through a sibling temp file and a rename, so a
//! reader never sees a half-written document.

use crate::config::BonvoyConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Directory holding bonvoy state inside the workspace.
pub const STATE_DIR: &str = ".bonvoy";

/// File name of the release log.
pub const RELEASE_LOG_FILE: &str = "release-log.json";

/// Lifecycle of a release log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReleaseStatus {
    /// Run started; actions are being appended.
    InProgress,
    /// Run finished successfully.
    Completed,
    /// Every recorded action was compensated.
    RolledBack,
    /// Rollback ran but could not compensate everything.
    RollbackFailed,
    /// A status this version does not know.
    Unrecognized(String),
}

impl ReleaseStatus {
    /// Whether the state machine allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(&self, to: &Self) -> bool {
        matches!(
            (self, to),
            (Self::InProgress, Self::Completed | Self::RolledBack | Self::RollbackFailed)
                | (Self::Completed | Self::RollbackFailed, Self::RolledBack | Self::RollbackFailed)
        )
    }

    /// Whether rollback may act on a log in this status.
    #[must_use]
    pub const fn is_rollbackable(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed | Self::RollbackFailed)
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::RolledBack => "rolled-back",
            Self::RollbackFailed => "rollback-failed",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for ReleaseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "in-progress" => Self::InProgress,
            "completed" => Self::Completed,
            "rolled-back" => Self::RolledBack,
            "rollback-failed" => Self::RollbackFailed,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<ReleaseStatus> for String {
    fn from(value: ReleaseStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single recorded action. Only completed actions are recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The side effect happened.
    #[default]
    Completed,
}

/// One side effect taken during a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Plugin that performed the action.
    pub plugin: String,
    /// Plugin-defined action kind (e.g. `tag`, `publish`).
    pub action: String,
    /// Everything the plugin needs to compensate the action.
    pub data: serde_json::Value,
    /// When the action was recorded.
    pub timestamp: DateTime<Utc>,
    /// Always `completed`.
    #[serde(default)]
    pub status: ActionStatus,
}

impl ActionEntry {
    /// Read a string field from `data`.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Read a string array field from `data`.
    #[must_use]
    pub fn data_strings(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Version change of one package in a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    /// Package name.
    pub name: String,
    /// Version before the release.
    pub from: String,
    /// Version being released.
    pub to: String,
}

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLog {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Configuration snapshot of the run.
    pub config: serde_json::Value,
    /// Packages released by the run.
    pub packages: Vec<PackageChange>,
    /// Actions in the order they happened.
    pub actions: Vec<ActionEntry>,
    /// Lifecycle status.
    pub status: ReleaseStatus,
}

/// Handle on the release log of one run.
#[derive(Debug)]
pub struct ActionJournal {
    path: PathBuf,
    log: Mutex<ReleaseLog>,
}

impl ActionJournal {
    /// Location of the release log for a workspace.
    #[must_use]
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join(RELEASE_LOG_FILE)
    }

    /// Start a new log in `in-progress`, replacing a previous `completed` or
    /// `rolled-back` one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedRelease`] when the previous log still needs
    /// recovery, or an error if the config cannot be serialized or the file
    /// cannot be written.
    pub fn start(root: &Path, config: &BonvoyConfig, packages: Vec<PackageChange>) -> Result<Self> {
        if let Some(previous) = Self::load(root)?
            && !matches!(
                previous.status,
                ReleaseStatus::Completed | ReleaseStatus::RolledBack
            )
        {
            return Err(Error::UnresolvedRelease {
                path: Self::path_for(root),
                status: previous.status.as_str().to_string(),
            });
        }
        let log = ReleaseLog {
            started_at: Utc::now(),
            config: serde_json::to_value(config)?,
            packages,
            actions: Vec::new(),
            status: ReleaseStatus::InProgress,
        };
        let journal = Self {
            path: Self::path_for(root),
            log: Mutex::new(log),
        };
        journal.flush(&journal.lock())?;
        Ok(journal)
    }

    /// Open the existing log of a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReleaseLog`] when no log exists, or an error if it
    /// cannot be read or parsed.
    pub fn open(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        let log = Self::load(root)?.ok_or_else(|| Error::NoReleaseLog { path: path.clone() })?;
        Ok(Self {
            path,
            log: Mutex::new(log),
        })
    }

    /// Read the log of a workspace, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Option<ReleaseLog>> {
        let path = Self::path_for(root);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a completed action and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JournalClosed`] if the run already reached a
    /// terminal status, or an I/O error if the flush fails.
    pub fn record(
        &self,
        plugin: impl Into<String>,
        action: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<ActionEntry> {
        let mut log = self.lock();
        if log.status != ReleaseStatus::InProgress {
            return Err(Error::JournalClosed {
                status: log.status.to_string(),
            });
        }

        let entry = ActionEntry {
            plugin: plugin.into(),
            action: action.into(),
            data,
            timestamp: Utc::now(),
            status: ActionStatus::Completed,
        };
        log.actions.push(entry.clone());

        if let Err(e) = self.flush(&log) {
            // Keep memory and disk in agreement.
            log.actions.pop();
            return Err(e);
        }

        debug!(
            plugin = %entry.plugin,
            action = %entry.action,
            count = log.actions.len(),
            "Recorded release action"
        );
        Ok(entry)
    }

    /// Mark the run completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is not `in-progress` or cannot be written.
    pub fn complete(&self) -> Result<()> {
        self.transition(ReleaseStatus::Completed)
    }

    /// Move the log to `to`, enforcing the status state machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusTransition`] for forbidden moves, or an
    /// I/O error if the flush fails.
    pub fn transition(&self, to: ReleaseStatus) -> Result<()> {
        let mut log = self.lock();
        if !log.status.can_transition_to(&to) {
            return Err(Error::InvalidStatusTransition {
                from: log.status.to_string(),
                to: to.to_string(),
            });
        }

        let previous = std::mem::replace(&mut log.status, to);
        if let Err(e) = self.flush(&log) {
            log.status = previous;
            return Err(e);
        }
        debug!(status = %log.status, "Release log status changed");
        Ok(())
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ReleaseStatus {
        self.lock().status.clone()
    }

    /// Copy of the in-memory log.
    #[must_use]
    pub fn snapshot(&self) -> ReleaseLog {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ReleaseLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, log: &ReleaseLog) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(log)?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
