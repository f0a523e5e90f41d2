//! Resolution of the dependency manifest for a release.
//!
//! The resolver fetches the release's parent manifest, reads versions for
//! the property-lookup table from it, fetches one metadata document per
//! metadata-lookup coordinate, and finally appends the pins. Output order
//! is table order within each source, sources in that sequence.

use super::client::{FetchError, RepositoryClient};
use super::coordinates::{ResolutionTables, ResolvedManifest, VersionedCoordinate};
use super::pom::{parse_manifest_properties, parse_metadata_version};
use crate::credentials::Credentials;
use crate::error::{ProvisionError, Result};
use crate::release::ReleaseId;
use log::{debug, info};

/// URL of the parent manifest for `release` below `repository_url`.
#[must_use]
pub fn parent_manifest_url(repository_url: &str, release: &ReleaseId) -> String {
    format!(
        "{}/com/here/platform/sdk-batch-bom/{release}/sdk-batch-bom-{release}.pom",
        repository_url.trim_end_matches('/')
    )
}

/// Resolves versioned coordinates against a repository.
pub struct ManifestVersionResolver<'a> {
    client: &'a dyn RepositoryClient,
    repository_url: &'a str,
    credentials: &'a Credentials,
    tables: &'a ResolutionTables,
}

impl<'a> ManifestVersionResolver<'a> {
    /// Creates a resolver issuing credentialed requests through `client`.
    #[must_use]
    pub fn new(
        client: &'a dyn RepositoryClient,
        repository_url: &'a str,
        credentials: &'a Credentials,
        tables: &'a ResolutionTables,
    ) -> Self {
        Self {
            client,
            repository_url,
            credentials,
            tables,
        }
    }

    /// Resolves the manifest for `release`.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::DuplicateCoordinate`] when the tables overlap;
    ///   checked before any request.
    /// - [`ProvisionError::InvalidRelease`] when the repository answers the
    ///   parent-manifest request with a non-success status.
    /// - [`ProvisionError::Network`] when any request fails in transport, or
    ///   a metadata request answers with a non-success status.
    /// - [`ProvisionError::Parse`] when a document is malformed.
    pub fn resolve(&self, release: &ReleaseId) -> Result<ResolvedManifest> {
        self.tables.validate()?;

        let url = parent_manifest_url(self.repository_url, release);
        let pom = self
            .client
            .fetch_text(&url, self.credentials)
            .map_err(|err| classify_parent_error(release, err))?;
        let properties = parse_manifest_properties(&pom, &url)?;
        debug!("parent manifest declares {} properties", properties.len());

        let mut entries = Vec::with_capacity(
            self.tables.property_lookups.len()
                + self.tables.metadata_lookups.len()
                + self.tables.pins.len(),
        );

        for lookup in &self.tables.property_lookups {
            match properties.get(&lookup.key) {
                Some(version) => entries.push(VersionedCoordinate::new(
                    lookup.coordinate.clone(),
                    version,
                )),
                None => debug!("skipping {}: no property {}", lookup.coordinate, lookup.key),
            }
        }

        for coordinate in &self.tables.metadata_lookups {
            let url = coordinate.metadata_url(self.repository_url);
            let document = self
                .client
                .fetch_text(&url, self.credentials)
                .map_err(network_error)?;
            let version = parse_metadata_version(&document, &url)?;
            entries.push(VersionedCoordinate::new(coordinate.clone(), version));
        }

        entries.extend(self.tables.pins.iter().cloned());

        info!("resolved {} coordinates for release {release}", entries.len());
        Ok(ResolvedManifest::new(entries))
    }
}

fn classify_parent_error(release: &ReleaseId, err: FetchError) -> ProvisionError {
    if err.is_http_status() {
        return ProvisionError::InvalidRelease {
            release: release.to_string(),
            reason: err.to_string(),
        };
    }
    network_error(err)
}

fn network_error(err: FetchError) -> ProvisionError {
    match err {
        FetchError::NotFound { url } => ProvisionError::Network {
            url,
            reason: "not found (HTTP 404)".to_owned(),
        },
        FetchError::Status { url, status } => ProvisionError::Network {
            url,
            reason: format!("HTTP {status}"),
        },
        FetchError::Transport { url, reason } => ProvisionError::Network { url, reason },
        FetchError::Io(err) => ProvisionError::Io(err),
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
