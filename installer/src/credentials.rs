//! Repository credentials read from the Maven settings store.
//!
//! The settings store is an XML document; namespaces are ignored and only
//! local element names are matched. Credentials come from the first
//! `servers/server` block and the repository URL from the first
//! `profiles/profile/repositories/repository/url` element.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

/// Errors arising while resolving credentials from the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The settings store does not exist.
    #[error("your repository settings ({path}) were not found")]
    MissingFile {
        /// Expected location of the settings store.
        path: Utf8PathBuf,
    },

    /// A required block or element is absent from the settings store.
    #[error("your repository settings ({path}) have no {field} configured")]
    MissingField {
        /// Location of the settings store.
        path: Utf8PathBuf,
        /// Element path that was not found.
        field: &'static str,
    },

    /// A credential element is absent or blank.
    #[error("your repository settings ({path}) have an empty {field}")]
    EmptyField {
        /// Location of the settings store.
        path: Utf8PathBuf,
        /// Name of the blank element.
        field: &'static str,
    },

    /// The settings store exists but could not be read or parsed.
    #[error("your repository settings ({path}) could not be read: {reason}")]
    Unreadable {
        /// Location of the settings store.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },
}

/// Repository username and password held for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Wraps a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The repository username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The repository password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the settings store contributes to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Credentials from the first server block.
    pub credentials: Credentials,
    /// Repository URL from the first profile, if configured.
    pub repository_url: Option<String>,
}

impl RepositorySettings {
    /// Returns the repository URL or fails with
    /// [`CredentialError::MissingField`].
    ///
    /// # Errors
    ///
    /// Fails when the settings store configured no repository URL.
    pub fn require_repository_url(&self, path: &Utf8Path) -> Result<&str, CredentialError> {
        self.repository_url
            .as_deref()
            .ok_or_else(|| CredentialError::MissingField {
                path: path.to_owned(),
                field: "profiles/profile/repositories/repository/url",
            })
    }
}

/// Reads credentials from a settings store on disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    settings_path: Utf8PathBuf,
}

impl CredentialStore {
    /// Creates a store reading from `settings_path`.
    #[must_use]
    pub fn new(settings_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
        }
    }

    /// Location of the settings store.
    #[must_use]
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Resolves the repository credentials.
    ///
    /// # Errors
    ///
    /// Fails closed with [`CredentialError::MissingFile`],
    /// [`CredentialError::MissingField`] or [`CredentialError::EmptyField`].
    pub fn resolve(&self) -> Result<Credentials, CredentialError> {
        self.repository_settings().map(|settings| settings.credentials)
    }

    /// Resolves the credentials together with the repository URL.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CredentialStore::resolve`].
    pub fn repository_settings(&self) -> Result<RepositorySettings, CredentialError> {
        if !self.settings_path.is_file() {
            return Err(CredentialError::MissingFile {
                path: self.settings_path.clone(),
            });
        }
        let contents = std::fs::read_to_string(&self.settings_path).map_err(|e| {
            CredentialError::Unreadable {
                path: self.settings_path.clone(),
                reason: e.to_string(),
            }
        })?;
        parse_settings(&contents, &self.settings_path)
    }
}

/// Parses settings store contents.
///
/// # Errors
///
/// Returns a [`CredentialError`] naming the absent or blank element.
pub fn parse_settings(contents: &str, path: &Utf8Path) -> Result<RepositorySettings, CredentialError> {
    let document = roxmltree::Document::parse(contents).map_err(|e| CredentialError::Unreadable {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    let root = document.root_element();

    let server = child_path(root, &["servers", "server"]).ok_or_else(|| {
        CredentialError::MissingField {
            path: path.to_owned(),
            field: "servers/server",
        }
    })?;
    let username = non_blank_child(server, "username", path)?;
    let password = non_blank_child(server, "password", path)?;

    let repository_url = child_path(
        root,
        &["profiles", "profile", "repositories", "repository", "url"],
    )
    .and_then(|node| node.text())
    .map(str::trim)
    .filter(|url| !url.is_empty())
    .map(|url| url.trim_end_matches('/').to_owned());

    Ok(RepositorySettings {
        credentials: Credentials::new(username, password),
        repository_url,
    })
}

fn non_blank_child(
    node: roxmltree::Node<'_, '_>,
    field: &'static str,
    path: &Utf8Path,
) -> Result<String, CredentialError> {
    crate::xml::child(node, field)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| CredentialError::EmptyField {
            path: path.to_owned(),
            field,
        })
}

fn child_path<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    names: &[&str],
) -> Option<roxmltree::Node<'a, 'input>> {
    names
        .iter()
        .try_fold(node, |current, name| crate::xml::child(current, name))
}
