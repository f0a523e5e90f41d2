//! SDK release identifier newtype.
//!
//! A release identifier is interpolated into repository URL paths and into
//! the default environment name, so it is validated before any URL is built:
//! non-empty, not `.` or `..`, and limited to ASCII letters, digits, `.`,
//! `_` and `-`.

use crate::error::{ProvisionError, Result};
use std::fmt;

/// A validated SDK release identifier such as `1.5` or `2.0.1-rc1`.
///
/// # Examples
///
/// ```
/// use sdk_provisioner::release::ReleaseId;
///
/// let release = ReleaseId::try_from("1.5").expect("valid release");
/// assert_eq!(release.as_str(), "1.5");
/// assert!(ReleaseId::try_from("../1.5").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Return the release as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ReleaseId {
    type Error = ProvisionError;

    fn try_from(value: &str) -> Result<Self> {
        validate_release(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ReleaseId {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        validate_release(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for ReleaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid(value: &str, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidRelease {
        release: value.to_owned(),
        reason: reason.into(),
    }
}

fn validate_release(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(value, "release must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(invalid(value, "release must not be a relative path segment"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(value, format!("unsupported character '{bad}'")));
    }
    Ok(())
}
