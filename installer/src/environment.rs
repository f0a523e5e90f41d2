//! The external environment manager (conda).
//!
//! The provisioner talks to conda only through [`EnvironmentManager`]. Each
//! host platform supplies a [`CondaInvocation`] that owns how a conda
//! argument vector becomes a process: directly on POSIX hosts, through
//! `cmd /C` on Windows where conda is a batch script. Arguments are passed
//! as a vector, but `cmd` re-parses its command line, so the Windows
//! invocation refuses any argument carrying a `cmd` metacharacter. Callers
//! validate environment names up front with [`crate::env_name::EnvName`].

use crate::context::Platform;
use crate::error::{ProvisionError, Result};
use crate::executor::{CommandExecutor, stderr_text, stdout_text};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Deserialize;
use std::process::Output;

/// An environment known to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRecord {
    /// Environment name.
    pub name: String,
    /// Environment prefix on disk.
    pub path: Utf8PathBuf,
}

/// Which branch brought the environment to its ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentBranch {
    /// The environment did not exist and was created before the
    /// specification was applied.
    Created,
    /// The environment existed and the specification was applied to it.
    Updated,
}

/// Operations the provisioner needs from the environment manager.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentManager {
    /// Lists every named environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ProvisioningFailed`] on a non-zero exit.
    fn list_environments(&self) -> Result<Vec<EnvironmentRecord>>;

    /// Creates an empty environment called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ProvisioningFailed`] on a non-zero exit.
    fn create_environment(&self, name: &str) -> Result<()>;

    /// Applies the specification file at `spec` to environment `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ProvisioningFailed`] on a non-zero exit.
    fn apply_spec(&self, name: &str, spec: &Utf8Path) -> Result<()>;

    /// Returns the installed version of `package` in environment `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ProvisioningFailed`] on a non-zero exit and
    /// [`ProvisionError::Parse`] when the listing is not valid JSON.
    fn query_package_version(&self, name: &str, package: &str) -> Result<Option<String>>;

    /// Returns the manager's `--version` output.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] when the manager cannot be spawned and
    /// [`ProvisionError::ProvisioningFailed`] on a non-zero exit.
    fn manager_version(&self) -> Result<String>;
}

/// Platform-specific mapping from conda arguments to a process.
pub trait CondaInvocation {
    /// Runs conda with `args` and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any error raised while spawning the process.
    fn conda(&self, args: &[&str]) -> Result<Output>;
}

/// Runs `conda` directly.
pub struct PosixConda<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> PosixConda<'a> {
    /// Wraps `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }
}

impl CondaInvocation for PosixConda<'_> {
    fn conda(&self, args: &[&str]) -> Result<Output> {
        self.executor.run("conda", args)
    }
}

/// Characters `cmd` interprets even inside an argument vector.
const CMD_METACHARACTERS: &[char] = &['&', '|', '<', '>', '^', '%', '"', '\r', '\n'];

/// Runs `conda` through `cmd /C`.
///
/// Arguments containing a `cmd` metacharacter are rejected with
/// [`ProvisionError::InvalidArgument`] before anything is spawned.
pub struct WindowsConda<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> WindowsConda<'a> {
    /// Wraps `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }
}

impl CondaInvocation for WindowsConda<'_> {
    fn conda(&self, args: &[&str]) -> Result<Output> {
        if let Some(arg) = args.iter().find(|arg| arg.contains(CMD_METACHARACTERS)) {
            return Err(ProvisionError::InvalidArgument {
                argument: "conda argument",
                value: (*arg).to_owned(),
                reason: "contains a character cmd would interpret".to_owned(),
            });
        }
        let mut full = Vec::with_capacity(args.len() + 2);
        full.extend(["/C", "conda"]);
        full.extend_from_slice(args);
        self.executor.run("cmd", &full)
    }
}

/// Selects the conda invocation for `platform`.
#[must_use]
pub fn for_platform<'a>(
    platform: Platform,
    executor: &'a dyn CommandExecutor,
) -> Box<dyn EnvironmentManager + 'a> {
    match platform {
        Platform::Posix => Box::new(PosixConda::new(executor)),
        Platform::Windows => Box::new(WindowsConda::new(executor)),
    }
}

fn checked(output: Output, operation: &'static str, environment: &str) -> Result<Output> {
    if output.status.success() {
        return Ok(output);
    }
    let mut message = stderr_text(&output);
    if message.is_empty() {
        message = format!("exited with {}", output.status);
    }
    Err(ProvisionError::ProvisioningFailed {
        operation,
        environment: environment.to_owned(),
        message,
    })
}

impl<T: CondaInvocation> EnvironmentManager for T {
    fn list_environments(&self) -> Result<Vec<EnvironmentRecord>> {
        let output = checked(self.conda(&["env", "list"])?, "env list", "*")?;
        Ok(parse_environment_list(&stdout_text(&output)))
    }

    fn create_environment(&self, name: &str) -> Result<()> {
        info!("creating conda environment {name}");
        checked(self.conda(&["create", "-y", "-n", name])?, "create", name)?;
        Ok(())
    }

    fn apply_spec(&self, name: &str, spec: &Utf8Path) -> Result<()> {
        info!("applying {spec} to conda environment {name}");
        checked(
            self.conda(&["env", "update", "-n", name, "-f", spec.as_str()])?,
            "env update",
            name,
        )?;
        Ok(())
    }

    fn query_package_version(&self, name: &str, package: &str) -> Result<Option<String>> {
        let output = checked(
            self.conda(&["list", "-n", name, package, "--json"])?,
            "list",
            name,
        )?;
        parse_package_version(&stdout_text(&output), package)
    }

    fn manager_version(&self) -> Result<String> {
        let output = checked(self.conda(&["--version"])?, "--version", "*")?;
        Ok(stdout_text(&output).trim().to_owned())
    }
}

/// Finds the environment called `name`, if it exists.
///
/// # Errors
///
/// Propagates listing failures.
pub fn find_environment(
    manager: &dyn EnvironmentManager,
    name: &str,
) -> Result<Option<EnvironmentRecord>> {
    let found = manager
        .list_environments()?
        .into_iter()
        .find(|record| record.name == name);
    debug!(
        "environment {name} {}",
        if found.is_some() { "exists" } else { "is absent" }
    );
    Ok(found)
}

/// Parses `conda env list` text output.
///
/// Comment and blank lines are skipped. The first token is the name and the
/// rest of the line, minus the active marker `*`, is the path. Unnamed
/// environments (a bare path) are skipped.
#[must_use]
pub fn parse_environment_list(output: &str) -> Vec<EnvironmentRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (name, rest) = line.split_once(char::is_whitespace)?;
            let rest = rest.trim_start();
            let path = rest.strip_prefix('*').unwrap_or(rest).trim();
            (!path.is_empty()).then(|| EnvironmentRecord {
                name: name.to_owned(),
                path: Utf8PathBuf::from(path),
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct PackageEntry {
    name: String,
    version: String,
}

/// Extracts the version of `package` from `conda list --json` output.
///
/// Leading noise before the JSON array is ignored.
///
/// # Errors
///
/// Returns [`ProvisionError::Parse`] when no JSON array can be read.
pub fn parse_package_version(output: &str, package: &str) -> Result<Option<String>> {
    let json = output
        .find('[')
        .and_then(|start| output.get(start..))
        .ok_or_else(|| ProvisionError::Parse {
            document: format!("conda list {package}"),
            reason: "no JSON array in output".to_owned(),
        })?;
    let entries: Vec<PackageEntry> =
        serde_json::from_str(json.trim_end()).map_err(|e| ProvisionError::Parse {
            document: format!("conda list {package}"),
            reason: e.to_string(),
        })?;
    Ok(entries
        .into_iter()
        .find(|entry| entry.name == package)
        .map(|entry| entry.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        ExpectedCall, StubExecutor, failure_output, output_with_stdout, success_output,
    };
    use rstest::rstest;

    const ENV_LIST: &str = "\
# conda environments:
#
base                  *  /opt/conda
olp-sdk-for-python-1.5-env     /opt/conda/envs/olp-sdk-for-python-1.5-env
spaced                   /home/a user/envs/spaced
                         /opt/other/unnamed
";

    #[test]
    fn parses_environment_list() {
        let records = parse_environment_list(ENV_LIST);
        assert_eq!(
            records,
            vec![
                EnvironmentRecord {
                    name: "base".to_owned(),
                    path: Utf8PathBuf::from("/opt/conda"),
                },
                EnvironmentRecord {
                    name: "olp-sdk-for-python-1.5-env".to_owned(),
                    path: Utf8PathBuf::from("/opt/conda/envs/olp-sdk-for-python-1.5-env"),
                },
                EnvironmentRecord {
                    name: "spaced".to_owned(),
                    path: Utf8PathBuf::from("/home/a user/envs/spaced"),
                },
            ]
        );
    }

    #[rstest]
    #[case::posix(Platform::Posix, "conda", vec!["env", "list"])]
    #[case::windows(Platform::Windows, "cmd", vec!["/C", "conda", "env", "list"])]
    fn list_uses_platform_invocation(
        #[case] platform: Platform,
        #[case] cmd: &str,
        #[case] args: Vec<&str>,
    ) {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            cmd,
            &args,
            Ok(output_with_stdout(ENV_LIST)),
        )]);
        let manager = for_platform(platform, &executor);

        let found = find_environment(manager.as_ref(), "olp-sdk-for-python-1.5-env")
            .expect("listing succeeds");

        assert!(found.is_some());
        executor.assert_finished();
    }

    #[test]
    fn apply_spec_failure_carries_stderr() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "conda",
            &["env", "update", "-n", "olp", "-f", "/tmp/spec.yml"],
            Ok(failure_output("ResolvePackageNotFound: nagini")),
        )]);
        let err = PosixConda::new(&executor)
            .apply_spec("olp", Utf8Path::new("/tmp/spec.yml"))
            .expect_err("non-zero exit");

        assert!(matches!(
            err,
            ProvisionError::ProvisioningFailed { operation: "env update", ref message, .. }
                if message.contains("ResolvePackageNotFound")
        ));
    }

    #[test]
    fn create_passes_name_as_single_argument() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "conda",
            &["create", "-y", "-n", "name; rm -rf ~"],
            Ok(success_output()),
        )]);
        PosixConda::new(&executor)
            .create_environment("name; rm -rf ~")
            .expect("argument vector, no shell");
        executor.assert_finished();
    }

    #[test]
    fn windows_runs_conda_through_cmd() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "cmd",
            &["/C", "conda", "create", "-y", "-n", "olp-sdk-for-python-1.5-env"],
            Ok(success_output()),
        )]);
        WindowsConda::new(&executor)
            .create_environment("olp-sdk-for-python-1.5-env")
            .expect("create succeeds");
        executor.assert_finished();
    }

    #[rstest]
    #[case::ampersand("dev&calc")]
    #[case::pipe("a|b")]
    #[case::percent("%PATH%")]
    #[case::quote("a\"b")]
    #[case::caret("a^b")]
    #[case::newline("a\nb")]
    fn windows_refuses_cmd_metacharacters(#[case] name: &str) {
        let executor = StubExecutor::new(Vec::new());
        let err = WindowsConda::new(&executor)
            .create_environment(name)
            .expect_err("metacharacter rejected");

        assert!(matches!(err, ProvisionError::InvalidArgument { .. }), "{err}");
        assert!(executor.received().is_empty());
    }

    #[rstest]
    #[case::found(r#"[{"name":"nagini","version":"1.5.0"},{"name":"nagini-extra","version":"0.1"}]"#, Some("1.5.0"))]
    #[case::noise_prefix("activating...\n[{\"name\":\"nagini\",\"version\":\"2.0\"}]\n", Some("2.0"))]
    #[case::absent("[]", None)]
    fn package_version_parsing(#[case] output: &str, #[case] expected: Option<&str>) {
        let version = parse_package_version(output, "nagini").expect("valid listing");
        assert_eq!(version.as_deref(), expected);
    }

    #[test]
    fn package_version_without_json_is_parse_error() {
        let err = parse_package_version("EnvironmentLocationNotFound", "nagini")
            .expect_err("no json");
        assert!(matches!(err, ProvisionError::Parse { .. }));
    }
}
