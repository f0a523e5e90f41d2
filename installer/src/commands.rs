//! Entry points shared by the binaries and the integration tests.
//!
//! Each function takes its collaborators as trait objects so the binaries
//! pass real implementations and the tests pass stubs.

use crate::config::ProvisionerConfig;
use crate::context::RunContext;
use crate::credentials::CredentialStore;
use crate::dirs::{BaseDirs, SdkPaths};
use crate::environment::EnvironmentManager;
use crate::error::{ProvisionError, Result};
use crate::output::{Progress, provision_message, rewrite_message};
use crate::prerequisites::validate_prerequisites;
use crate::provisioner::{EnvironmentProvisioner, ProvisionDeps, ProvisionOutcome};
use crate::release::ReleaseId;
use crate::repository::{ManifestVersionResolver, RepositoryClient, ResolutionTables};
use crate::rewriter::{ConfigSource, DependencyFileRewriter, WriteResult};
use crate::workspace::CleanupRegistry;
use camino::Utf8Path;
use semver::Version;

/// Resolves the SDK file locations below the user's home directory.
///
/// # Errors
///
/// Returns [`ProvisionError::PrerequisiteMissing`] when no home directory
/// can be determined.
pub fn resolve_paths(dirs: &dyn BaseDirs) -> Result<SdkPaths> {
    SdkPaths::resolve(dirs).ok_or_else(|| ProvisionError::PrerequisiteMissing {
        missing: vec!["home directory".to_owned()],
    })
}

/// Loads the provisioner settings.
///
/// An explicit `--config` file must exist; the default location is
/// optional.
///
/// # Errors
///
/// Returns [`ProvisionError::Config`] when the file is missing (explicit
/// only) or invalid.
pub fn load_config(explicit: Option<&Utf8Path>, paths: &SdkPaths) -> Result<ProvisionerConfig> {
    match explicit {
        Some(path) if !path.is_file() => Err(ProvisionError::Config {
            path: path.to_owned(),
            reason: "file not found".to_owned(),
        }),
        Some(path) => ProvisionerConfig::load_or_default(path),
        None => ProvisionerConfig::load_or_default(&paths.provisioner_config()),
    }
}

/// Checks prerequisites without changing anything.
///
/// # Errors
///
/// Returns [`ProvisionError::PrerequisiteMissing`] listing every gap.
pub fn run_verify(
    manager: &dyn EnvironmentManager,
    paths: &SdkPaths,
    config: &ProvisionerConfig,
    progress: &mut Progress<'_>,
) -> Result<Version> {
    let version = validate_prerequisites(manager, paths, &config.min_conda_version)?;
    progress.step(format!(
        "All prerequisites are satisfied (conda {version})."
    ));
    Ok(version)
}

/// Runs an install or update to completion.
///
/// # Errors
///
/// Returns whichever error moved the provisioning run to `Failed`.
pub fn run_provision(
    context: &RunContext,
    paths: &SdkPaths,
    deps: ProvisionDeps<'_>,
    progress: &mut Progress<'_>,
) -> Result<ProvisionOutcome> {
    let outcome = EnvironmentProvisioner::new(context, paths, deps).run(progress)?;
    if let Some(report) = &outcome.post_install {
        for warning in &report.warnings {
            progress.step(format!("warning: {warning}"));
        }
    }
    progress.step(provision_message(context.env_name.as_str(), outcome.branch));
    Ok(outcome)
}

/// Collaborators of a dependency-config update.
#[derive(Clone, Copy)]
pub struct ConfigUpdateDeps<'a> {
    /// Artifact repository client.
    pub repository: &'a dyn RepositoryClient,
    /// Coordinate tables to resolve.
    pub tables: &'a ResolutionTables,
    /// Registry for the archive rebuild workspace.
    pub registry: &'a CleanupRegistry,
}

/// Resolves `release` and writes it into the config found in `dir`.
///
/// Credentials and the config source are checked before any request is
/// made; nothing is written unless resolution succeeds.
///
/// # Errors
///
/// Returns [`ProvisionError::InvalidRelease`] for an unsafe or unknown
/// release, a credential error when the settings store is incomplete,
/// [`ProvisionError::NoConfigFound`] when `dir` has no config, and any
/// resolution or rewrite error.
pub fn run_config_update_with(
    release: &str,
    dir: &Utf8Path,
    paths: &SdkPaths,
    deps: ConfigUpdateDeps<'_>,
    progress: &mut Progress<'_>,
) -> Result<WriteResult> {
    let release = ReleaseId::try_from(release)?;

    let store = CredentialStore::new(paths.settings_store());
    let settings = store.repository_settings()?;
    let repository_url = settings.require_repository_url(store.settings_path())?;

    let source = ConfigSource::discover(dir)?;

    progress.step(format!("Resolving library versions for release {release}..."));
    let manifest = ManifestVersionResolver::new(
        deps.repository,
        repository_url,
        &settings.credentials,
        deps.tables,
    )
    .resolve(&release)?;

    let result = DependencyFileRewriter::new(deps.registry).rewrite(&source, &manifest)?;
    progress.step(rewrite_message(result.packages, &result.target, &result.backup));
    Ok(result)
}
