//! Authenticated HTTP access to the artifact repository.
//!
//! Provides a trait-based abstraction over the three request shapes the
//! provisioner issues (manifest, metadata, specification archive) so tests
//! can script responses without network access. Every request carries HTTP
//! basic authentication built from the run's [`Credentials`].

use crate::credentials::Credentials;
use base64::Engine;
use log::debug;
use std::path::Path;

/// Trait for fetching documents and archives from the repository.
///
/// # Examples
///
/// ```no_run
/// use sdk_provisioner::credentials::Credentials;
/// use sdk_provisioner::repository::client::{HttpRepositoryClient, RepositoryClient};
///
/// let client = HttpRepositoryClient::new();
/// let credentials = Credentials::new("analyst", "secret");
/// let pom = client.fetch_text("https://repo.example.test/bom.pom", &credentials)?;
/// # Ok::<(), sdk_provisioner::repository::client::FetchError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryClient {
    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] on HTTP 404, [`FetchError::Status`]
    /// on any other non-success status, and [`FetchError::Transport`] when
    /// no response was received.
    fn fetch_text(&self, url: &str, credentials: &Credentials) -> Result<String, FetchError>;

    /// Downloads `url` into the file at `dest`.
    ///
    /// # Errors
    ///
    /// Same classification as [`RepositoryClient::fetch_text`], plus
    /// [`FetchError::Io`] when `dest` cannot be written.
    fn download(&self, url: &str, credentials: &Credentials, dest: &Path)
    -> Result<(), FetchError>;
}

/// Errors arising from repository requests.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The repository answered 404.
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The repository answered with another non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request did not produce a response.
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// Writing the response body to disk failed.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Returns `true` for any answer that is not a success status.
    #[must_use]
    pub fn is_http_status(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Status { .. })
    }
}

/// HTTP client backed by `ureq`.
///
/// Uses the transport defaults for timeouts; no retries are attempted.
#[derive(Debug)]
pub struct HttpRepositoryClient {
    agent: ureq::Agent,
}

impl HttpRepositoryClient {
    /// Creates a client with default transport settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn get(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<ureq::http::Response<ureq::Body>, FetchError> {
        debug!("GET {url}");
        self.agent
            .get(url)
            .header("Authorization", basic_auth_header(credentials))
            .call()
            .map_err(|e| map_ureq_error(url, &e))
    }
}

impl Default for HttpRepositoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryClient for HttpRepositoryClient {
    fn fetch_text(&self, url: &str, credentials: &Credentials) -> Result<String, FetchError> {
        let response = self.get(url, credentials)?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download(
        &self,
        url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let response = self.get(url, credentials)?;
        let mut body = response.into_body();
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut body.as_reader(), &mut file)?;
        Ok(())
    }
}

/// Builds the `Authorization` header value for HTTP basic authentication.
#[must_use]
pub fn basic_auth_header(credentials: &Credentials) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credentials.username(),
        credentials.password()
    ));
    format!("Basic {token}")
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(status) => FetchError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => FetchError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
