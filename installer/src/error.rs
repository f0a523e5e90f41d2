//! Error types for the SDK provisioner.
//!
//! Every failure class a run can end in has its own variant so the user sees
//! which entity was missing or invalid. Variants group into the taxonomy the
//! provisioner reports: prerequisite gaps, unknown releases, transport
//! failures, unexpected documents, environment-manager failures, and
//! post-install verification gaps.

use crate::credentials::CredentialError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while provisioning or updating the SDK.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// One or more required tools or local files are absent.
    #[error("the following prerequisites are not properly configured:{}", bullet_list(.missing))]
    PrerequisiteMissing {
        /// Every missing file or tool, in check order.
        missing: Vec<String>,
    },

    /// The settings store could not provide usable credentials.
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The release identifier is unsafe or unknown to the repository.
    #[error("release version {release} is not valid: {reason}")]
    InvalidRelease {
        /// The rejected release identifier.
        release: String,
        /// Why the release was rejected.
        reason: String,
    },

    /// A command-line value cannot be passed safely to an external tool.
    #[error("invalid value '{value}' for {argument}: {reason}")]
    InvalidArgument {
        /// The option the value was given for.
        argument: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The versioned specification archive does not exist.
    #[error("release version {release} cannot be found")]
    ReleaseNotFound {
        /// The release that was requested.
        release: String,
    },

    /// A metadata or manifest request failed at the transport or HTTP level.
    #[error("request to {url} failed: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// Downloading or unpacking the specification archive failed.
    #[error(
        "error while downloading configuration files from {url}: {reason}; check the version provided and your credential files"
    )]
    Download {
        /// The archive URL.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// A remote document could not be parsed.
    #[error("could not parse {document}: {reason}")]
    Parse {
        /// Name or URL of the document.
        document: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// Two resolution tables claim the same coordinate.
    #[error("coordinate {coordinate} appears in more than one resolution table")]
    DuplicateCoordinate {
        /// The coordinate listed twice.
        coordinate: String,
    },

    /// Neither a loose config document nor a config archive was found.
    #[error("either {loose} or {archive} is expected in {dir}")]
    NoConfigFound {
        /// Directory that was searched.
        dir: Utf8PathBuf,
        /// Expected loose document name.
        loose: &'static str,
        /// Expected archive name.
        archive: &'static str,
    },

    /// The config document lacks the expected structure.
    #[error("malformed config {path}: {reason}")]
    MalformedConfig {
        /// Path of the document (or archive entry).
        path: String,
        /// Description of what was missing or invalid.
        reason: String,
    },

    /// Writing an output document failed.
    #[error("failed to write {path}: {reason}")]
    Write {
        /// Path that could not be written.
        path: Utf8PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The environment manager reported a failure.
    #[error("conda {operation} failed for environment '{environment}': {message}")]
    ProvisioningFailed {
        /// The logical operation (list, create, update, query).
        operation: &'static str,
        /// The target environment.
        environment: String,
        /// Captured diagnostic output.
        message: String,
    },

    /// Generated artefacts are missing after an apparently successful run.
    #[error("installation finished but generated files are missing:{}", bullet_list(.missing))]
    PostInstallVerificationFailed {
        /// Every generated artefact absent from disk.
        missing: Vec<Utf8PathBuf>,
    },

    /// The settings file for the provisioner itself is invalid.
    #[error("invalid provisioner config {path}: {reason}")]
    Config {
        /// Path of the config file.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn bullet_list<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| format!("\n  {item}")).collect()
}

/// Result type alias using [`ProvisionError`].
pub type Result<T> = std::result::Result<T, ProvisionError>;
