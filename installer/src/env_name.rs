//! Conda environment name newtype.
//!
//! The name reaches conda as a single argument, but on Windows conda is a
//! batch script launched through `cmd /C`, which re-parses the command line
//! and honours its own metacharacters. Names are therefore limited to ASCII
//! letters, digits, `.`, `_`, `-` and `+`, which conda accepts and `cmd`
//! treats as plain text.

use crate::error::{ProvisionError, Result};
use crate::release::ReleaseId;
use std::fmt;

/// A validated conda environment name such as `olp-sdk-for-python-1.5-env`.
///
/// # Examples
///
/// ```
/// use sdk_provisioner::env_name::EnvName;
///
/// let name = EnvName::try_from("analytics").expect("valid name");
/// assert_eq!(name.as_str(), "analytics");
/// assert!(EnvName::try_from("dev&calc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvName(String);

impl EnvName {
    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The default name for `release`.
    ///
    /// Release identifiers use a subset of the permitted characters, so the
    /// result needs no further validation.
    pub(crate) fn for_release(release: &ReleaseId) -> Self {
        Self(format!("olp-sdk-for-python-{release}-env"))
    }
}

impl TryFrom<&str> for EnvName {
    type Error = ProvisionError;

    fn try_from(value: &str) -> Result<Self> {
        validate_env_name(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for EnvName {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        validate_env_name(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for EnvName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid(value: &str, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidArgument {
        argument: "--name",
        value: value.to_owned(),
        reason: reason.into(),
    }
}

fn validate_env_name(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(value, "environment name must not be empty"));
    }
    if value.starts_with('-') {
        return Err(invalid(value, "environment name must not start with '-'"));
    }
    if value == "." || value == ".." {
        return Err(invalid(value, "environment name must not be a relative path segment"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+')))
    {
        return Err(invalid(value, format!("unsupported character '{bad}'")));
    }
    Ok(())
}
