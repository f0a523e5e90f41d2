//! CLI argument definitions for the SDK provisioner binaries.
//!
//! Both binaries are defined here so the binaries themselves stay small and
//! focused on orchestration.

use crate::context::Operation;
use camino::Utf8PathBuf;
use clap::{ArgAction, ArgGroup, Parser};

/// Install, update or verify the OLP SDK for Python conda environment.
#[derive(Parser, Debug)]
#[command(name = "sdk-setup")]
#[command(version, about)]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["verify", "install", "update"]),
))]
#[command(long_about = concat!(
    "Install, update or verify the OLP SDK for Python conda environment.\n\n",
    "Before anything is downloaded the tool checks that conda is installed and ",
    "that the platform credential files exist below your home directory. The ",
    "environment specification for the requested release is then downloaded ",
    "from the repository configured in ~/.m2/settings.xml and applied to the ",
    "target environment, which is created first when it does not exist.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Check prerequisites only:\n",
    "    $ sdk-setup --verify\n\n",
    "  Install the default release into olp-sdk-for-python-1.5-env:\n",
    "    $ sdk-setup --install\n\n",
    "  Install a release into a named environment:\n",
    "    $ sdk-setup --install 1.6 --name analytics\n\n",
    "  Apply a release to an existing environment:\n",
    "    $ sdk-setup --update 1.6 --name analytics\n",
))]
pub struct SetupCli {
    /// Check prerequisites and exit.
    #[arg(short = 'v', long)]
    pub verify: bool,

    /// Install a release [default: configured default release].
    #[arg(short = 'i', long, value_name = "VERSION", num_args = 0..=1)]
    pub install: Option<Option<String>>,

    /// Apply a release to the environment given by --name.
    #[arg(
        short = 'u',
        long,
        value_name = "VERSION",
        num_args = 0..=1,
        requires = "name"
    )]
    pub update: Option<Option<String>>,

    /// Target environment name [default: olp-sdk-for-python-<VERSION>-env].
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Provisioner settings file [default: ~/.here/sdk-setup.toml].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log detail (repeatable).
    #[arg(long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,
}

impl SetupCli {
    /// The selected operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        if self.install.is_some() {
            Operation::Install
        } else if self.update.is_some() {
            Operation::Update
        } else {
            Operation::Verify
        }
    }

    /// The release given to `--install` or `--update`, if any.
    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.install
            .as_ref()
            .or(self.update.as_ref())
            .and_then(Option::as_deref)
    }
}

/// Update the Spark dependency list in config.json or spark-conf-files.zip.
#[derive(Parser, Debug)]
#[command(name = "sdk-config-updater")]
#[command(about, disable_version_flag = true)]
#[command(long_about = concat!(
    "Update the Spark dependency list in config.json or spark-conf-files.zip.\n\n",
    "Library versions are resolved from the SDK bill of materials for the given ",
    "release and from the repository's artifact metadata, then written to ",
    "session_configs.conf.\"spark.jars.packages\". The original file is kept as ",
    "original_config.json or original_spark-conf-files.zip.",
))]
pub struct UpdaterCli {
    /// SDK release whose library versions are written.
    #[arg(short = 'v', long = "version", value_name = "VERSION")]
    pub release: String,

    /// Directory holding config.json or spark-conf-files.zip.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: Utf8PathBuf,

    /// Increase log detail (repeatable).
    #[arg(long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
