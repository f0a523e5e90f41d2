//! The immutable description of one provisioning run.
//!
//! Built once from the parsed command line and the provisioner config, then
//! passed by reference to every component.

use crate::config::ProvisionerConfig;
use crate::env_name::EnvName;
use crate::error::Result;
use crate::release::ReleaseId;
use camino::Utf8PathBuf;

/// Host platform family, deciding how the environment manager is invoked
/// and whether post-install wiring runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux, macOS and other Unix-like hosts.
    Posix,
    /// Windows hosts.
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// What the run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Check prerequisites only.
    Verify,
    /// Create (or converge) an environment and generate credential files.
    Install,
    /// Apply a release to a named environment.
    Update,
}

/// Default environment name for `release`.
#[must_use]
pub fn default_environment_name(release: &ReleaseId) -> EnvName {
    EnvName::for_release(release)
}

/// Everything a provisioning run needs to know up front.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The requested operation.
    pub operation: Operation,
    /// The SDK release to install or apply.
    pub sdk_version: ReleaseId,
    /// Target environment name.
    pub env_name: EnvName,
    /// Host platform.
    pub platform: Platform,
    /// Suppress progress output.
    pub quiet: bool,
    /// Directory below which transient workspaces are created.
    pub scratch_dir: Utf8PathBuf,
    /// Provisioner settings.
    pub config: ProvisionerConfig,
}

impl RunContext {
    /// Builds a context, resolving the release and environment name.
    ///
    /// `release` falls back to the configured default; `env_name` falls back
    /// to [`default_environment_name`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ProvisionError::InvalidRelease`] when the
    /// release identifier is not path-safe, and
    /// [`crate::error::ProvisionError::InvalidArgument`] when the environment
    /// name contains characters conda or `cmd` would not take literally.
    pub fn new(
        operation: Operation,
        release: Option<&str>,
        env_name: Option<&str>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        let sdk_version = ReleaseId::try_from(release.unwrap_or(&config.default_sdk_version))?;
        let env_name = match env_name {
            Some(name) => EnvName::try_from(name)?,
            None => default_environment_name(&sdk_version),
        };
        Ok(Self {
            operation,
            sdk_version,
            env_name,
            platform: Platform::host(),
            quiet: false,
            scratch_dir: default_scratch_dir(),
            config,
        })
    }

    /// Sets the quiet flag.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Overrides the host platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Overrides the scratch directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, scratch_dir: Utf8PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }
}

fn default_scratch_dir() -> Utf8PathBuf {
    Utf8PathBuf::try_from(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(None, None, "1.5", "olp-sdk-for-python-1.5-env")]
    #[case::explicit_release(Some("1.6"), None, "1.6", "olp-sdk-for-python-1.6-env")]
    #[case::explicit_name(Some("1.6"), Some("analytics"), "1.6", "analytics")]
    fn resolves_release_and_name(
        #[case] release: Option<&str>,
        #[case] name: Option<&str>,
        #[case] expected_release: &str,
        #[case] expected_name: &str,
    ) {
        let context = RunContext::new(
            Operation::Install,
            release,
            name,
            ProvisionerConfig::default(),
        )
        .expect("valid context");
        assert_eq!(context.sdk_version.as_str(), expected_release);
        assert_eq!(context.env_name.as_str(), expected_name);
    }

    #[rstest]
    #[case::command_separator("dev&calc")]
    #[case::pipe("a|b")]
    #[case::redirect("a>b")]
    #[case::caret("^x")]
    #[case::variable("%PATH%")]
    #[case::quote("\"q\"")]
    #[case::parens("(a)")]
    #[case::space("a b")]
    #[case::slash("x/y")]
    #[case::colon("c:")]
    #[case::hash("#n")]
    fn unsafe_name_is_rejected_before_anything_else(#[case] name: &str) {
        let err = RunContext::new(
            Operation::Install,
            Some("1.5"),
            Some(name),
            ProvisionerConfig::default(),
        )
        .expect_err("unsafe name");
        assert!(
            matches!(
                &err,
                ProvisionError::InvalidArgument { argument: "--name", value, .. } if value == name
            ),
            "{err}"
        );
    }

    #[test]
    fn unsafe_release_is_rejected_before_anything_else() {
        let err = RunContext::new(
            Operation::Install,
            Some("../../etc"),
            None,
            ProvisionerConfig::default(),
        )
        .expect_err("unsafe release");
        assert!(matches!(err, ProvisionError::InvalidRelease { .. }));
    }
}
