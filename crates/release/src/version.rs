//! Version resolution.
//!
//! Turns a [`VersionRequest`] into a concrete next version for each package:
//! - standard semver increments (pre-1.0 versions are not special-cased)
//! - npm-style prerelease counters
//! - validation of explicit target versions

use crate::bump::{BumpSeverity, VersionRequest};
use crate::context::{StageContext, VersionContext};
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use semver::{BuildMetadata, Prerelease, Version};
use tracing::{debug, info, warn};

/// Outcome of resolving one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The version to release.
    pub version: String,
    /// The request that produced it.
    pub request: VersionRequest,
    /// The current version could not be incremented; `version` is unchanged.
    pub degraded: bool,
}

fn parse_loose(version: &str) -> std::result::Result<Version, semver::Error> {
    let trimmed = version.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed))
}

/// Apply a severity to a parsed version.
///
/// # Errors
///
/// Returns an error if `prerelease_id` is not a valid prerelease identifier.
pub fn increment(
    current: &Version,
    severity: BumpSeverity,
    prerelease_id: Option<&str>,
) -> Result<Version> {
    let mut next = current.clone();
    next.build = BuildMetadata::EMPTY;
    let is_pre = !current.pre.is_empty();

    match severity {
        BumpSeverity::None => {}
        BumpSeverity::Major => {
            // 2.0.0-rc.1 releases as 2.0.0
            if !(is_pre && current.minor == 0 && current.patch == 0) {
                next.major += 1;
                next.minor = 0;
                next.patch = 0;
            }
            next.pre = Prerelease::EMPTY;
        }
        BumpSeverity::Minor => {
            if !(is_pre && current.patch == 0) {
                next.minor += 1;
                next.patch = 0;
            }
            next.pre = Prerelease::EMPTY;
        }
        BumpSeverity::Patch => {
            if !is_pre {
                next.patch += 1;
            }
            next.pre = Prerelease::EMPTY;
        }
        BumpSeverity::Prerelease => {
            let pre = if is_pre {
                next_prerelease(current.pre.as_str(), prerelease_id)
            } else {
                next.patch += 1;
                prerelease_id.map_or_else(|| "0".to_string(), |id| format!("{id}.0"))
            };
            next.pre = Prerelease::new(&pre).map_err(|_| Error::invalid_version(pre.clone()))?;
        }
    }

    Ok(next)
}

fn next_prerelease(current: &str, prerelease_id: Option<&str>) -> String {
    if let Some(id) = prerelease_id
        && current != id
        && !current.starts_with(&format!("{id}."))
    {
        return format!("{id}.0");
    }

    let mut parts: Vec<String> = current.split('.').map(str::to_string).collect();
    match parts.iter().rposition(|p| p.parse::<u64>().is_ok()) {
        Some(idx) => {
            let n: u64 = parts[idx].parse().unwrap_or(0);
            parts[idx] = (n + 1).to_string();
        }
        None => parts.push("0".to_string()),
    }
    parts.join(".")
}

/// Resolve the next version of a package.
///
/// Returns `Ok(None)` when the request releases nothing.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] for an explicit version that is not
/// valid semver. A current version that cannot be parsed is not an error:
/// the version is kept and the result is flagged `degraded`.
pub fn next_version(
    current: &str,
    request: &VersionRequest,
    prerelease_id: Option<&str>,
) -> Result<Option<Resolution>> {
    match request {
        VersionRequest::Bump(BumpSeverity::None) => Ok(None),
        VersionRequest::Explicit(target) => {
            let parsed = parse_loose(target).map_err(|_| Error::invalid_version(target.clone()))?;
            Ok(Some(Resolution {
                version: parsed.to_string(),
                request: request.clone(),
                degraded: false,
            }))
        }
        VersionRequest::Bump(severity) => match parse_loose(current) {
            Ok(parsed) => Ok(Some(Resolution {
                version: increment(&parsed, *severity, prerelease_id)?.to_string(),
                request: request.clone(),
                degraded: false,
            })),
            Err(e) => {
                warn!(
                    current = %current,
                    bump = %severity,
                    error = %e,
                    "Cannot increment unparsable version; keeping it unchanged"
                );
                Ok(Some(Resolution {
                    version: current.to_string(),
                    request: request.clone(),
                    degraded: true,
                }))
            }
        },
    }
}

/// Drives the `getVersion` hook for every package.
pub struct VersionResolver<'h> {
    hooks: &'h Hooks,
}

impl<'h> VersionResolver<'h> {
    /// Create a resolver over a hook set.
    #[must_use]
    pub const fn new(hooks: &'h Hooks) -> Self {
        Self { hooks }
    }

    /// Resolve every package of `ctx`, one at a time in discovery order.
    ///
    /// A `force` request replaces whatever the hook would compute; the hook
    /// is not run at all in that case.
    ///
    /// Populates `versions`, `bumps` and `changed_packages`.
    ///
    /// # Errors
    ///
    /// Returns an error if a `getVersion` handler fails or an explicit
    /// version is invalid.
    pub async fn resolve(
        &self,
        ctx: &mut VersionContext,
        force: Option<&VersionRequest>,
    ) -> Result<()> {
        let packages = ctx.packages.clone();
        let prerelease_id = ctx.config.prerelease_id.clone();

        for package in packages {
            ctx.context_mut().current_package = Some(package.clone());

            let request = match force {
                Some(forced) => Some(forced.clone()),
                None => self.hooks.get_version.call(ctx, None).await?,
            };

            let Some(request) = request else {
                debug!(package = %package.name, "No version request; skipping");
                continue;
            };

            let Some(resolution) =
                next_version(&package.version, &request, prerelease_id.as_deref())?
            else {
                debug!(package = %package.name, "Bump is none; skipping");
                continue;
            };

            info!(
                package = %package.name,
                from = %package.version,
                to = %resolution.version,
                bump = %resolution.request,
                "Resolved version"
            );

            ctx.versions
                .insert(package.name.clone(), resolution.version);
            ctx.bumps.insert(package.name.clone(), resolution.request);
            ctx.context_mut().changed_packages.push(package);
        }

        ctx.context_mut().current_package = None;
        Ok(())
    }
}

/// Write resolved versions into the package records.
pub fn apply_versions(ctx: &mut VersionContext) {
    let versions = ctx.versions.clone();
    let base = ctx.context_mut();
    for package in base
        .packages
        .iter_mut()
        .chain(base.changed_packages.iter_mut())
    {
        if let Some(version) = versions.get(&package.name) {
            package.version.clone_from(version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(current: &str, severity: BumpSeverity) -> String {
        next_version(current, &VersionRequest::Bump(severity), None)
            .unwrap()
            .unwrap()
            .version
    }

    #[test]
    fn test_standard_increments() {
        assert_eq!(bump("1.2.3", BumpSeverity::Patch), "1.2.4");
        assert_eq!(bump("1.2.3", BumpSeverity::Minor), "1.3.0");
        assert_eq!(bump("1.2.3", BumpSeverity::Major), "2.0.0");
        assert_eq!(bump("1.5.3", BumpSeverity::Major), "2.0.0");
    }

    #[test]
    fn test_pre_1_0_is_not_dampened() {
        assert_eq!(bump("0.5.0", BumpSeverity::Major), "1.0.0");
        assert_eq!(bump("0.5.0", BumpSeverity::Minor), "0.6.0");
    }

    #[test]
    fn test_prerelease_increments() {
        assert_eq!(bump("1.2.3", BumpSeverity::Prerelease), "1.2.4-0");
        assert_eq!(bump("1.2.4-0", BumpSeverity::Prerelease), "1.2.4-1");
        assert_eq!(bump("1.2.4-beta.1", BumpSeverity::Prerelease), "1.2.4-beta.2");
        assert_eq!(bump("1.2.4-beta", BumpSeverity::Prerelease), "1.2.4-beta.0");
    }

    #[test]
    fn test_prerelease_with_identifier() {
        let req = VersionRequest::Bump(BumpSeverity::Prerelease);
        let next = |v: &str| next_version(v, &req, Some("rc")).unwrap().unwrap().version;
        assert_eq!(next("1.0.0"), "1.0.1-rc.0");
        assert_eq!(next("1.0.1-rc.0"), "1.0.1-rc.1");
        assert_eq!(next("1.0.1-beta.3"), "1.0.1-rc.0");
    }

    #[test]
    fn test_release_bump_on_prerelease_drops_pre() {
        assert_eq!(bump("2.0.0-rc.1", BumpSeverity::Major), "2.0.0");
        assert_eq!(bump("1.3.0-0", BumpSeverity::Minor), "1.3.0");
        assert_eq!(bump("1.2.4-0", BumpSeverity::Patch), "1.2.4");
        assert_eq!(bump("1.2.4-0", BumpSeverity::Major), "2.0.0");
    }

    #[test]
    fn test_build_metadata_dropped() {
        assert_eq!(bump("1.0.0+build.5", BumpSeverity::Patch), "1.0.1");
    }

    #[test]
    fn test_none_excludes() {
        assert!(
            next_version("1.0.0", &VersionRequest::Bump(BumpSeverity::None), None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_explicit_version() {
        let res = next_version("1.0.0", &VersionRequest::Explicit("3.1.0-beta.2".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(res.version, "3.1.0-beta.2");
        assert!(!res.degraded);
    }

    #[test]
    fn test_explicit_invalid_is_fatal() {
        let err = next_version("1.0.0", &VersionRequest::Explicit("1.0".into()), None).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn test_unparsable_current_is_degraded() {
        let res = next_version("invalid", &VersionRequest::Bump(BumpSeverity::Minor), None)
            .unwrap()
            .unwrap();
        assert_eq!(res.version, "invalid");
        assert!(res.degraded);
    }

    #[test]
    fn test_leading_v_accepted() {
        assert_eq!(bump("v1.0.0", BumpSeverity::Minor), "1.1.0");
    }
}
