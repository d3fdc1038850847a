//! Bump severities and version requests.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Magnitude of a semantic-version increment.
///
/// Ordered `None < Prerelease < Patch < Minor < Major`, so `max` picks the
/// strongest bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpSeverity {
    /// No version change.
    None,
    /// Prerelease counter bump (`1.2.4-0` -> `1.2.4-1`).
    Prerelease,
    /// Patch version bump (0.0.X).
    Patch,
    /// Minor version bump (0.X.0).
    Minor,
    /// Major version bump (X.0.0).
    Major,
}

impl FromStr for BumpSeverity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "prerelease" => Ok(Self::Prerelease),
            "none" => Ok(Self::None),
            _ => Err(Error::config(
                format!("Invalid bump type: {s}"),
                "Expected major, minor, patch, prerelease, or none",
            )),
        }
    }
}

impl fmt::Display for BumpSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// What a package's next version should be: a severity, or an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionRequest {
    /// Increment by a severity.
    Bump(BumpSeverity),
    /// Release exactly this version. Validated at resolution time.
    Explicit(String),
}

impl VersionRequest {
    /// Combine two requests; an explicit version always wins, otherwise the
    /// stronger severity.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        match (self, other) {
            (explicit @ Self::Explicit(_), _) | (_, explicit @ Self::Explicit(_)) => explicit,
            (Self::Bump(a), Self::Bump(b)) => Self::Bump(a.max(b)),
        }
    }

    /// Whether this request releases anything at all.
    #[must_use]
    pub fn is_release(&self) -> bool {
        !matches!(self, Self::Bump(BumpSeverity::None))
    }
}

impl From<BumpSeverity> for VersionRequest {
    fn from(severity: BumpSeverity) -> Self {
        Self::Bump(severity)
    }
}

impl FromStr for VersionRequest {
    type Err = Error;

    /// Parses a CLI-style override: a severity name or a version string.
    fn from_str(s: &str) -> Result<Self> {
        s.parse::<BumpSeverity>()
            .map(Self::Bump)
            .or_else(|_| Ok(Self::Explicit(s.trim().to_string())))
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bump(severity) => write!(f, "{severity}"),
            Self::Explicit(version) => write!(f, "{version}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        assert!(BumpSeverity::Major > BumpSeverity::Minor);
        assert!(BumpSeverity::Minor > BumpSeverity::Patch);
        assert!(BumpSeverity::Patch > BumpSeverity::Prerelease);
        assert!(BumpSeverity::Prerelease > BumpSeverity::None);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("MAJOR".parse::<BumpSeverity>().unwrap(), BumpSeverity::Major);
        assert_eq!(" prerelease ".parse::<BumpSeverity>().unwrap(), BumpSeverity::Prerelease);
        assert!("huge".parse::<BumpSeverity>().is_err());
    }

    #[test]
    fn test_explicit_outranks_severity() {
        let explicit = VersionRequest::Explicit("3.0.0".into());
        assert_eq!(
            VersionRequest::Bump(BumpSeverity::Major).max(explicit.clone()),
            explicit
        );
        assert_eq!(
            explicit.clone().max(VersionRequest::Bump(BumpSeverity::Major)),
            explicit
        );
    }

    #[test]
    fn test_request_max_of_bumps() {
        let a = VersionRequest::Bump(BumpSeverity::Patch);
        let b = VersionRequest::Bump(BumpSeverity::Minor);
        assert_eq!(a.max(b), VersionRequest::Bump(BumpSeverity::Minor));
    }

    #[test]
    fn test_request_parse() {
        assert_eq!(
            "minor".parse::<VersionRequest>().unwrap(),
            VersionRequest::Bump(BumpSeverity::Minor)
        );
        assert_eq!(
            "2.0.0-rc.1".parse::<VersionRequest>().unwrap(),
            VersionRequest::Explicit("2.0.0-rc.1".into())
        );
    }

    #[test]
    fn test_is_release() {
        assert!(!VersionRequest::Bump(BumpSeverity::None).is_release());
        assert!(VersionRequest::Bump(BumpSeverity::Prerelease).is_release());
        assert!(VersionRequest::Explicit("1.0.0".into()).is_release());
    }
}
