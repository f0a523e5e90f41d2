//! Prerequisite validation.
//!
//! Every check runs before anything is reported, so the user sees the full
//! list of missing files and tools in one error.

use crate::dirs::SdkPaths;
use crate::environment::EnvironmentManager;
use crate::error::{ProvisionError, Result};
use crate::toolchain::{ToolchainStatus, check_toolchain};
use log::info;
use semver::Version;

/// Checks the environment manager version and the local credential files.
///
/// Returns the detected manager version when everything is in place.
///
/// # Errors
///
/// Returns [`ProvisionError::PrerequisiteMissing`] listing the manager
/// problem (if any) followed by every absent credential file.
pub fn validate_prerequisites(
    manager: &dyn EnvironmentManager,
    paths: &SdkPaths,
    min_conda_version: &str,
) -> Result<Version> {
    let status = check_toolchain(manager, min_conda_version);
    let mut missing: Vec<String> = status.problem().into_iter().collect();
    missing.extend(
        paths
            .required_credential_files()
            .into_iter()
            .filter(|file| !file.is_file())
            .map(|file| file.to_string()),
    );

    match status {
        ToolchainStatus::Supported(version) if missing.is_empty() => {
            info!("prerequisites satisfied (conda {version})");
            Ok(version)
        }
        _ => Err(ProvisionError::PrerequisiteMissing { missing }),
    }
}
