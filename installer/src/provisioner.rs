//! The provisioning state machine.
//!
//! One run walks `Idle → Validated → CredentialsLoaded → Downloaded →
//! EnvironmentReady → CredentialFilesWritten → Verified → Done`. Any failure
//! moves the run to `Failed` and returns the error; the transient workspace
//! holding the downloaded specification is removed on every path, either
//! explicitly at `Done` or when its guard is dropped.
//!
//! Install and update share this machine. Whether the environment is created
//! first depends only on whether the manager already lists it; both branches
//! end with the specification applied.

use crate::archive::ArchiveExtractor;
use crate::context::{Platform, RunContext};
use crate::credentials::{CredentialStore, Credentials};
use crate::dirs::SdkPaths;
use crate::environment::{
    EnvironmentBranch, EnvironmentManager, EnvironmentRecord, find_environment,
};
use crate::error::{ProvisionError, Result};
use crate::output::{Progress, download_message};
use crate::post_install::{WiringReport, run_post_install};
use crate::prerequisites::validate_prerequisites;
use crate::repository::{FetchError, RepositoryClient};
use crate::templates::{render_condarc, render_ivy_settings};
use crate::workspace::{CleanupRegistry, TransientWorkspace};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use std::fmt;
use std::time::Instant;

/// File name the specification archive is downloaded to.
const ARCHIVE_FILE_NAME: &str = "conda-env-files.zip";

/// States of one provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Nothing has happened yet.
    Idle,
    /// Prerequisites are present.
    Validated,
    /// Repository credentials were read from the settings store.
    CredentialsLoaded,
    /// The specification archive was downloaded and extracted.
    Downloaded,
    /// The environment exists with the specification applied.
    EnvironmentReady,
    /// `.condarc` and the Ivy settings were generated.
    CredentialFilesWritten,
    /// Every generated file is present on disk.
    Verified,
    /// The run finished and the workspace was removed.
    Done,
    /// The run stopped on an error.
    Failed,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validated => "validated",
            Self::CredentialsLoaded => "credentials loaded",
            Self::Downloaded => "downloaded",
            Self::EnvironmentReady => "environment ready",
            Self::CredentialFilesWritten => "credential files written",
            Self::Verified => "verified",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// External collaborators of a provisioning run.
#[derive(Clone, Copy)]
pub struct ProvisionDeps<'a> {
    /// Environment manager.
    pub manager: &'a dyn EnvironmentManager,
    /// Artifact repository client.
    pub repository: &'a dyn RepositoryClient,
    /// Specification archive extractor.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Registry the transient workspace is registered with.
    pub registry: &'a CleanupRegistry,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// The environment the specification was applied to.
    pub environment: EnvironmentRecord,
    /// Whether the environment was created by this run.
    pub branch: EnvironmentBranch,
    /// Generated credential files.
    pub generated: Vec<Utf8PathBuf>,
    /// Post-install wiring result, when it ran.
    pub post_install: Option<WiringReport>,
}

/// Drives one install or update run.
pub struct EnvironmentProvisioner<'a> {
    context: &'a RunContext,
    paths: &'a SdkPaths,
    deps: ProvisionDeps<'a>,
    states: Vec<ProvisionState>,
}

impl<'a> EnvironmentProvisioner<'a> {
    /// Creates a provisioner in the `Idle` state.
    #[must_use]
    pub fn new(context: &'a RunContext, paths: &'a SdkPaths, deps: ProvisionDeps<'a>) -> Self {
        Self {
            context,
            paths,
            deps,
            states: vec![ProvisionState::Idle],
        }
    }

    /// States visited so far, in order.
    #[must_use]
    pub fn states(&self) -> &[ProvisionState] {
        &self.states
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ProvisionState {
        self.states.last().copied().unwrap_or(ProvisionState::Idle)
    }

    /// Runs the machine to `Done` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the run to `Failed`. The transient
    /// workspace has been removed by the time this returns.
    pub fn run(&mut self, progress: &mut Progress<'_>) -> Result<ProvisionOutcome> {
        let result = self.drive(progress);
        if result.is_err() {
            self.enter(ProvisionState::Failed);
        }
        result
    }

    fn drive(&mut self, progress: &mut Progress<'_>) -> Result<ProvisionOutcome> {
        progress.step("Checking prerequisites...");
        validate_prerequisites(
            self.deps.manager,
            self.paths,
            &self.context.config.min_conda_version,
        )?;
        self.enter(ProvisionState::Validated);

        let credentials = CredentialStore::new(self.paths.settings_store()).resolve()?;
        self.enter(ProvisionState::CredentialsLoaded);

        let workspace = TransientWorkspace::create_in(&self.context.scratch_dir, self.deps.registry)?;
        let spec = self.download_spec(&workspace, &credentials, progress)?;
        self.enter(ProvisionState::Downloaded);

        progress.step(format!(
            "Preparing environment {}...",
            self.context.env_name
        ));
        let (environment, branch) =
            converge_environment(self.deps.manager, self.context.env_name.as_str(), &spec)?;
        self.enter(ProvisionState::EnvironmentReady);

        let generated = self.write_credential_files(&environment, &credentials)?;
        self.enter(ProvisionState::CredentialFilesWritten);

        verify_generated(&generated)?;
        self.enter(ProvisionState::Verified);

        let post_install = (self.context.platform == Platform::Windows).then(|| {
            progress.step("Linking tutorials and documentation...");
            run_post_install(self.deps.manager, &environment, self.paths.home())
        });

        workspace.close()?;
        self.enter(ProvisionState::Done);

        Ok(ProvisionOutcome {
            environment,
            branch,
            generated,
            post_install,
        })
    }

    fn enter(&mut self, state: ProvisionState) {
        info!("provisioning {}: {state}", self.context.env_name);
        self.states.push(state);
    }

    fn download_spec(
        &self,
        workspace: &TransientWorkspace,
        credentials: &Credentials,
        progress: &mut Progress<'_>,
    ) -> Result<Utf8PathBuf> {
        let config = &self.context.config;
        let url = config.spec_archive_url(self.context.sdk_version.as_str());
        let archive = workspace.path().join(ARCHIVE_FILE_NAME);

        progress.step(format!("Downloading {url}..."));
        let started = Instant::now();
        self.deps
            .repository
            .download(&url, credentials, archive.as_std_path())
            .map_err(|err| self.download_error(&url, err))?;
        progress.step(download_message(&url, started.elapsed()));

        self.deps
            .extractor
            .extract(archive.as_std_path(), workspace.path().as_std_path())
            .map_err(|err| ProvisionError::Download {
                url: url.clone(),
                reason: err.to_string(),
            })?;

        let spec = workspace.path().join(&config.spec_file);
        if !spec.is_file() {
            return Err(ProvisionError::Download {
                url,
                reason: format!("archive does not contain {}", config.spec_file),
            });
        }
        Ok(spec)
    }

    fn download_error(&self, url: &str, err: FetchError) -> ProvisionError {
        match err {
            FetchError::NotFound { .. } => ProvisionError::ReleaseNotFound {
                release: self.context.sdk_version.to_string(),
            },
            other => ProvisionError::Download {
                url: url.to_owned(),
                reason: other.to_string(),
            },
        }
    }

    fn write_credential_files(
        &self,
        environment: &EnvironmentRecord,
        credentials: &Credentials,
    ) -> Result<Vec<Utf8PathBuf>> {
        let config = &self.context.config;

        let condarc = environment.path.join(".condarc");
        if condarc.exists() {
            info!("keeping existing {condarc}");
        } else {
            write_file(&condarc, &render_condarc(config, credentials))?;
        }

        let ivy = self.paths.resolver_config();
        write_file(&ivy, &render_ivy_settings(config, credentials))?;

        Ok(vec![condarc, ivy])
    }
}

/// Brings environment `name` to the state described by `spec`.
///
/// An absent environment is created and re-listed to learn its path before
/// the specification is applied; an existing one has the specification
/// applied directly.
///
/// # Errors
///
/// Returns [`ProvisionError::ProvisioningFailed`] when any manager call
/// fails or a freshly created environment is not listed.
pub fn converge_environment(
    manager: &dyn EnvironmentManager,
    name: &str,
    spec: &Utf8Path,
) -> Result<(EnvironmentRecord, EnvironmentBranch)> {
    if let Some(record) = find_environment(manager, name)? {
        manager.apply_spec(name, spec)?;
        return Ok((record, EnvironmentBranch::Updated));
    }

    manager.create_environment(name)?;
    let record = find_environment(manager, name)?.ok_or_else(|| {
        ProvisionError::ProvisioningFailed {
            operation: "create",
            environment: name.to_owned(),
            message: "environment is not listed after creation".to_owned(),
        }
    })?;
    manager.apply_spec(name, spec)?;
    Ok((record, EnvironmentBranch::Created))
}

/// Checks that every generated file exists.
///
/// # Errors
///
/// Returns [`ProvisionError::PostInstallVerificationFailed`] naming every
/// absent file.
pub fn verify_generated(generated: &[Utf8PathBuf]) -> Result<()> {
    let missing: Vec<Utf8PathBuf> = generated
        .iter()
        .filter(|path| !path.is_file())
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::PostInstallVerificationFailed { missing })
    }
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<()> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    };
    write().map_err(|err| ProvisionError::Write {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    info!("wrote {path}");
    Ok(())
}

#[cfg(test)]
#[path = "provisioner_tests.rs"]
mod tests;
