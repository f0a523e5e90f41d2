//! Post-install wiring for Windows hosts.
//!
//! After a verified install, tutorial and documentation trees shipped inside
//! the environment are linked into place, convenience launchers are linked
//! into `bin/`, and an activation script sets `PYTHONPATH`. The wiring is
//! advisory: each step checks existing state first, and a failing step is
//! logged and skipped without undoing earlier steps.

use crate::environment::{EnvironmentManager, EnvironmentRecord};
use crate::error::{ProvisionError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use std::fmt;
use std::io;

/// Installed versions of the packages whose trees are wired up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersions {
    /// Version of the `nagini` package (Python tutorials and API reference).
    pub nagini: String,
    /// Version of the `emr` package (EMR and Spark tutorials).
    pub emr: String,
    /// Version of the `olp-sdk-for-python` package (documentation root).
    pub olp_sdk: String,
}

impl PackageVersions {
    /// Queries the three package versions from `environment`.
    ///
    /// # Errors
    ///
    /// Propagates query failures; a package that is not installed is a
    /// [`ProvisionError::Parse`] naming it.
    pub fn query(manager: &dyn EnvironmentManager, environment: &str) -> Result<Self> {
        let version = |package: &str| -> Result<String> {
            manager
                .query_package_version(environment, package)?
                .ok_or_else(|| ProvisionError::Parse {
                    document: format!("conda list {package}"),
                    reason: format!("{package} is not installed in {environment}"),
                })
        };
        Ok(Self {
            nagini: version("nagini")?,
            emr: version("emr")?,
            olp_sdk: version("olp-sdk-for-python")?,
        })
    }
}

/// One idempotent filesystem action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringStep {
    /// Delete a file if present.
    RemoveFile(Utf8PathBuf),
    /// Create `link` pointing at `target` unless `link` already exists.
    Link {
        /// What the link points at.
        target: Utf8PathBuf,
        /// Where the link is created.
        link: Utf8PathBuf,
    },
    /// Remove a symbolic link if present; other file types are left alone.
    Unlink(Utf8PathBuf),
    /// Create a directory and its parents.
    CreateDir(Utf8PathBuf),
    /// Write a small file, replacing any previous contents.
    WriteFile {
        /// Destination path.
        path: Utf8PathBuf,
        /// File contents.
        contents: String,
    },
    /// Mark an existing path read-only.
    ReadOnly(Utf8PathBuf),
}

impl fmt::Display for WiringStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveFile(path) => write!(f, "remove {path}"),
            Self::Link { target, link } => write!(f, "link {link} -> {target}"),
            Self::Unlink(path) => write!(f, "unlink {path}"),
            Self::CreateDir(path) => write!(f, "create directory {path}"),
            Self::WriteFile { path, .. } => write!(f, "write {path}"),
            Self::ReadOnly(path) => write!(f, "mark {path} read-only"),
        }
    }
}

/// Builds the wiring plan for the environment at `prefix`.
///
/// Read-only marking comes last so that links can still be created inside
/// the documentation tree.
#[must_use]
pub fn plan(prefix: &Utf8Path, home: &Utf8Path, versions: &PackageVersions) -> Vec<WiringStep> {
    let nagini = prefix.join(format!("nagini-{}", versions.nagini));
    let emr_tutorials = prefix.join(format!("emr-{}", versions.emr)).join("tutorial-notebooks");
    let spark_tutorials = prefix
        .join(format!("spark-{}", versions.emr))
        .join("tutorial-notebooks");
    let docs = prefix.join(format!("olp-sdk-for-python-{}", versions.olp_sdk));
    let docs_entry = home.join(format!("olp-sdk-for-python-{}", versions.olp_sdk));
    let tutorials = docs.join("tutorial-notebooks");
    let activate = prefix.join("etc").join("conda").join("activate.d");
    let env_vars = activate.join("env_vars.bat");
    let launchers = prefix.join("lib").join("olp-emr").join("bin");
    let bin = prefix.join("bin");

    let link = |target: Utf8PathBuf, link: Utf8PathBuf| WiringStep::Link { target, link };

    vec![
        WiringStep::RemoveFile(env_vars.clone()),
        link(launchers.join("init.bat"), bin.join("emr-init.lnk")),
        link(launchers.join("deploy.bat"), bin.join("emr-provision.lnk")),
        link(launchers.join("destroy.bat"), bin.join("emr-deprovision.lnk")),
        WiringStep::Unlink(docs_entry.clone()),
        link(emr_tutorials.clone(), tutorials.join("emr")),
        link(spark_tutorials.clone(), tutorials.join("spark")),
        link(nagini.join("tutorial-notebooks"), tutorials.join("python")),
        WiringStep::CreateDir(docs.join("documentation")),
        link(
            nagini.join("api-reference").join("index.html"),
            docs.join("documentation")
                .join("OLP SDK for Python API Reference.html"),
        ),
        link(docs.clone(), docs_entry),
        WiringStep::CreateDir(activate),
        WiringStep::CreateDir(prefix.join("etc").join("conda").join("deactivate.d")),
        WiringStep::WriteFile {
            path: env_vars,
            contents: format!("set PYTHONPATH={prefix}/Lib/python3.7/site-packages"),
        },
        WiringStep::ReadOnly(nagini.join("tutorial-notebooks")),
        WiringStep::ReadOnly(nagini.join("api-reference")),
        WiringStep::ReadOnly(emr_tutorials),
        WiringStep::ReadOnly(spark_tutorials),
        WiringStep::ReadOnly(docs),
    ]
}

/// Outcome of applying a wiring plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringReport {
    /// Steps that changed something.
    pub applied: usize,
    /// Steps whose target state already held.
    pub skipped: usize,
    /// Steps that failed, with the reason.
    pub warnings: Vec<String>,
}

enum StepOutcome {
    Applied,
    Skipped,
}

/// Applies `steps` in order, continuing past failures.
pub fn apply(steps: &[WiringStep]) -> WiringReport {
    let mut report = WiringReport::default();
    for step in steps {
        match apply_step(step) {
            Ok(StepOutcome::Applied) => {
                info!("{step}");
                report.applied += 1;
            }
            Ok(StepOutcome::Skipped) => report.skipped += 1,
            Err(err) => {
                warn!("post-install step failed: {step}: {err}");
                report.warnings.push(format!("{step}: {err}"));
            }
        }
    }
    report
}

/// Queries package versions and applies the wiring plan for `environment`.
///
/// Never fails; a failed version query is reported as a single warning.
pub fn run_post_install(
    manager: &dyn EnvironmentManager,
    environment: &EnvironmentRecord,
    home: &Utf8Path,
) -> WiringReport {
    match PackageVersions::query(manager, &environment.name) {
        Ok(versions) => apply(&plan(&environment.path, home, &versions)),
        Err(err) => {
            warn!("skipping post-install wiring: {err}");
            WiringReport {
                warnings: vec![format!("package version query failed: {err}")],
                ..WiringReport::default()
            }
        }
    }
}

fn apply_step(step: &WiringStep) -> io::Result<StepOutcome> {
    match step {
        WiringStep::RemoveFile(path) => {
            if !path.is_file() {
                return Ok(StepOutcome::Skipped);
            }
            std::fs::remove_file(path)?;
        }
        WiringStep::Link { target, link } => {
            if link.symlink_metadata().is_ok() {
                return Ok(StepOutcome::Skipped);
            }
            create_link(target, link)?;
        }
        WiringStep::Unlink(path) => {
            let is_link = path
                .symlink_metadata()
                .is_ok_and(|meta| meta.file_type().is_symlink());
            if !is_link {
                return Ok(StepOutcome::Skipped);
            }
            remove_link(path)?;
        }
        WiringStep::CreateDir(path) => {
            if path.is_dir() {
                return Ok(StepOutcome::Skipped);
            }
            std::fs::create_dir_all(path)?;
        }
        WiringStep::WriteFile { path, contents } => {
            if std::fs::read_to_string(path).is_ok_and(|existing| existing == *contents) {
                return Ok(StepOutcome::Skipped);
            }
            std::fs::write(path, contents)?;
        }
        WiringStep::ReadOnly(path) => {
            let mut permissions = std::fs::metadata(path)?.permissions();
            if permissions.readonly() {
                return Ok(StepOutcome::Skipped);
            }
            permissions.set_readonly(true);
            std::fs::set_permissions(path, permissions)?;
        }
    }
    Ok(StepOutcome::Applied)
}

#[cfg(unix)]
fn create_link(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(unix)]
fn remove_link(path: &Utf8Path) -> io::Result<()> {
    std::fs::remove_file(path)
}

#[cfg(windows)]
fn remove_link(path: &Utf8Path) -> io::Result<()> {
    // Directory symlinks on Windows are removed as directories.
    std::fs::remove_dir(path).or_else(|_| std::fs::remove_file(path))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::environment::MockEnvironmentManager;
    use rstest::{fixture, rstest};

    struct Layout {
        _temp: tempfile::TempDir,
        prefix: Utf8PathBuf,
        home: Utf8PathBuf,
        versions: PackageVersions,
    }

    #[fixture]
    fn layout() -> Layout {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        let prefix = root.join("envs").join("olp");
        let home = root.join("home");
        let versions = PackageVersions {
            nagini: "1.5.0".to_owned(),
            emr: "2.1.0".to_owned(),
            olp_sdk: "1.5".to_owned(),
        };
        for dir in [
            prefix.join("bin"),
            prefix.join("lib/olp-emr/bin"),
            prefix.join("nagini-1.5.0/tutorial-notebooks"),
            prefix.join("nagini-1.5.0/api-reference"),
            prefix.join("emr-2.1.0/tutorial-notebooks"),
            prefix.join("spark-2.1.0/tutorial-notebooks"),
            prefix.join("olp-sdk-for-python-1.5/tutorial-notebooks"),
            home.clone(),
        ] {
            std::fs::create_dir_all(dir).expect("create layout");
        }
        Layout {
            _temp: temp,
            prefix,
            home,
            versions,
        }
    }

    fn without_read_only(steps: Vec<WiringStep>) -> Vec<WiringStep> {
        steps
            .into_iter()
            .filter(|step| !matches!(step, WiringStep::ReadOnly(_)))
            .collect()
    }

    #[rstest]
    fn api_reference_link_targets_index_inside_nagini(layout: Layout) {
        let steps = plan(&layout.prefix, &layout.home, &layout.versions);
        let target = steps.iter().find_map(|step| match step {
            WiringStep::Link { target, link } if link.as_str().ends_with("API Reference.html") => {
                Some(target.clone())
            }
            _ => None,
        });
        assert_eq!(
            target,
            Some(layout.prefix.join("nagini-1.5.0/api-reference/index.html"))
        );
    }

    #[rstest]
    fn apply_is_idempotent(layout: Layout) {
        let steps = without_read_only(plan(&layout.prefix, &layout.home, &layout.versions));

        let first = apply(&steps);
        assert!(first.warnings.is_empty(), "{:?}", first.warnings);
        assert!(first.applied > 0);

        let second = apply(&steps);
        assert!(second.warnings.is_empty(), "{:?}", second.warnings);
        // The activation script and the home entry link are refreshed on every run.
        assert_eq!(second.applied, 4);

        let entry = layout.home.join("olp-sdk-for-python-1.5");
        assert_eq!(
            std::fs::read_link(&entry).expect("home entry link"),
            layout.prefix.join("olp-sdk-for-python-1.5")
        );
        let env_vars = std::fs::read_to_string(layout.prefix.join("etc/conda/activate.d/env_vars.bat"))
            .expect("activation script");
        assert!(env_vars.starts_with("set PYTHONPATH="));
    }

    #[rstest]
    fn failing_step_does_not_stop_later_steps(layout: Layout) {
        std::fs::remove_dir_all(layout.prefix.join("bin")).expect("remove bin");
        let steps = without_read_only(plan(&layout.prefix, &layout.home, &layout.versions));

        let report = apply(&steps);

        assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
        assert!(layout.prefix.join("etc/conda/deactivate.d").is_dir());
    }

    #[rstest]
    fn version_query_failure_skips_wiring(layout: Layout) {
        let mut manager = MockEnvironmentManager::new();
        manager
            .expect_query_package_version()
            .returning(|_, _| Ok(None));
        let record = EnvironmentRecord {
            name: "olp".to_owned(),
            path: layout.prefix.clone(),
        };

        let report = run_post_install(&manager, &record, &layout.home);

        assert_eq!(report.applied, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(!layout.prefix.join("etc").exists());
    }
}
