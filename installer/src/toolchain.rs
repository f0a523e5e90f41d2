//! Environment-manager version detection.
//!
//! `conda --version` prints `conda X.Y[.Z]`. The version is parsed into a
//! [`semver::Version`], padding missing segments with zero, so `10.0.0`
//! orders after `3.0.0`.

use crate::environment::EnvironmentManager;
use crate::error::{ProvisionError, Result};
use log::debug;
use semver::Version;

/// Outcome of probing the environment manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainStatus {
    /// Installed at a supported version.
    Supported(Version),
    /// Installed, but older than required.
    TooOld {
        /// The detected version.
        found: Version,
        /// The minimum supported version.
        required: Version,
    },
    /// Not installed, not runnable, or its version is unreadable.
    Missing(String),
}

impl ToolchainStatus {
    /// Describes the problem for prerequisite reporting; `None` when supported.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        match self {
            Self::Supported(_) => None,
            Self::TooOld { found, required } => {
                Some(format!("conda {required} or greater (found {found})"))
            }
            Self::Missing(reason) => Some(format!("conda ({reason})")),
        }
    }
}

/// Parses a loose `X`, `X.Y` or `X.Y.Z` version, padding with zeros.
///
/// Pre-release or build suffixes on a full three-part version are kept.
///
/// # Examples
///
/// ```
/// use sdk_provisioner::toolchain::parse_loose_version;
///
/// assert_eq!(parse_loose_version("4.8").map(|v| v.to_string()), Some("4.8.0".to_owned()));
/// assert!(parse_loose_version("four").is_none());
/// ```
#[must_use]
pub fn parse_loose_version(value: &str) -> Option<Version> {
    let value = value.trim();
    if let Ok(version) = Version::parse(value) {
        return Some(version);
    }
    let mut parts = value.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, 0))
}

/// Extracts the version from `conda --version` output.
///
/// # Errors
///
/// Returns [`ProvisionError::Parse`] when the output has no parseable
/// version token.
pub fn parse_manager_version(output: &str) -> Result<Version> {
    output
        .split_whitespace()
        .find_map(parse_loose_version)
        .ok_or_else(|| ProvisionError::Parse {
            document: "conda --version".to_owned(),
            reason: format!("no version in '{}'", output.trim()),
        })
}

/// Probes the environment manager and compares its version to `minimum`.
///
/// Never fails: every problem becomes a [`ToolchainStatus`] so it can be
/// reported alongside missing files.
pub fn check_toolchain(manager: &dyn EnvironmentManager, minimum: &str) -> ToolchainStatus {
    let Some(required) = parse_loose_version(minimum) else {
        return ToolchainStatus::Missing(format!("invalid minimum version '{minimum}'"));
    };
    let output = match manager.manager_version() {
        Ok(output) => output,
        Err(ProvisionError::Io(err)) => return ToolchainStatus::Missing(format!("not found: {err}")),
        Err(err) => return ToolchainStatus::Missing(err.to_string()),
    };
    match parse_manager_version(&output) {
        Ok(found) if found >= required => {
            debug!("conda {found} satisfies minimum {required}");
            ToolchainStatus::Supported(found)
        }
        Ok(found) => ToolchainStatus::TooOld { found, required },
        Err(err) => ToolchainStatus::Missing(err.to_string()),
    }
}
