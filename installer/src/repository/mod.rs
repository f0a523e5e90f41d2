//! Remote artifact repository access and manifest resolution.
//!
//! - [`client`]: credentialed HTTP requests behind the [`client::RepositoryClient`] seam.
//! - [`coordinates`]: artifact identities and the static resolution tables.
//! - [`pom`]: parsing of parent manifests and per-artifact metadata.
//! - [`resolver`]: the [`resolver::ManifestVersionResolver`] combining them.

pub mod client;
pub mod coordinates;
pub mod pom;
pub mod resolver;

pub use client::{FetchError, HttpRepositoryClient, RepositoryClient};
pub use coordinates::{Coordinate, ResolutionTables, ResolvedManifest, VersionedCoordinate};
pub use resolver::ManifestVersionResolver;
