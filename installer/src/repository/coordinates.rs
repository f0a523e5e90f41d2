//! Artifact coordinates and the static resolution tables.
//!
//! A coordinate is `group:artifact`. The resolver combines three disjoint
//! tables: coordinates whose version is looked up by key in the release's
//! parent manifest, coordinates whose version comes from their own
//! repository metadata, and pins whose version is fixed.

use crate::error::{ProvisionError, Result};
use std::collections::HashSet;
use std::fmt;

/// Artifact identity (`group:artifact`), independent of version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    group: String,
    artifact: String,
}

impl Coordinate {
    /// Creates a coordinate from its group and artifact.
    #[must_use]
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    /// Parses `group:artifact`; returns `None` unless both halves are present.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (group, artifact) = value.split_once(':')?;
        if group.is_empty() || artifact.is_empty() || artifact.contains(':') {
            return None;
        }
        Some(Self::new(group, artifact))
    }

    /// The group identifier.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The artifact identifier.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// URL of this artifact's `maven-metadata.xml` below `repository_url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdk_provisioner::repository::coordinates::Coordinate;
    ///
    /// let coordinate = Coordinate::new("com.here.account", "here-oauth-client");
    /// assert_eq!(
    ///     coordinate.metadata_url("https://repo.example.test/olp"),
    ///     "https://repo.example.test/olp/com/here/account/here-oauth-client/maven-metadata.xml"
    /// );
    /// ```
    #[must_use]
    pub fn metadata_url(&self, repository_url: &str) -> String {
        format!(
            "{}/{}/{}/maven-metadata.xml",
            repository_url.trim_end_matches('/'),
            self.group.replace('.', "/"),
            self.artifact
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// A coordinate paired with its resolved version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCoordinate {
    /// The artifact identity.
    pub coordinate: Coordinate,
    /// The version token, kept verbatim.
    pub version: String,
}

impl VersionedCoordinate {
    /// Pairs `coordinate` with `version`.
    #[must_use]
    pub fn new(coordinate: Coordinate, version: impl Into<String>) -> Self {
        Self {
            coordinate,
            version: version.into(),
        }
    }
}

impl fmt::Display for VersionedCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coordinate, self.version)
    }
}

/// The ordered result of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedManifest(Vec<VersionedCoordinate>);

impl ResolvedManifest {
    /// Wraps resolved entries, keeping their order.
    #[must_use]
    pub fn new(entries: Vec<VersionedCoordinate>) -> Self {
        Self(entries)
    }

    /// The entries in resolution order.
    #[must_use]
    pub fn entries(&self) -> &[VersionedCoordinate] {
        &self.0
    }

    /// Number of resolved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined `coordinate:version` tokens for the packages field.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdk_provisioner::repository::coordinates::{
    ///     Coordinate, ResolvedManifest, VersionedCoordinate,
    /// };
    ///
    /// let manifest = ResolvedManifest::new(vec![
    ///     VersionedCoordinate::new(Coordinate::new("com.here.olp.util", "mapquad"), "1.2.3"),
    ///     VersionedCoordinate::new(Coordinate::new("com.typesafe", "config"), "1.3.3"),
    /// ]);
    /// assert_eq!(
    ///     manifest.packages_field(),
    ///     "com.here.olp.util:mapquad:1.2.3,com.typesafe:config:1.3.3"
    /// );
    /// ```
    #[must_use]
    pub fn packages_field(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A coordinate whose version is read from a parent-manifest property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLookup {
    /// The artifact to resolve.
    pub coordinate: Coordinate,
    /// The property name holding its version.
    pub key: String,
}

impl PropertyLookup {
    /// Pairs `coordinate` with its property `key`.
    #[must_use]
    pub fn new(coordinate: Coordinate, key: impl Into<String>) -> Self {
        Self {
            coordinate,
            key: key.into(),
        }
    }
}

/// The three static tables driving one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTables {
    /// Coordinates resolved from parent-manifest properties, in output order.
    pub property_lookups: Vec<PropertyLookup>,
    /// Coordinates resolved from their own repository metadata, in output order.
    pub metadata_lookups: Vec<Coordinate>,
    /// Coordinates with fixed versions, appended last.
    pub pins: Vec<VersionedCoordinate>,
}

const LOCATION: &str = "com.here.platform.location";
const RIB: &str = "com.here.schema.rib";
const DATA_CLIENT: &str = "com.here.platform.data.client";
const ANALYTICS: &str = "com.here.platform.analytics";

const PROPERTY_LOOKUPS: &[(&str, &str, &str)] = &[
    ("com.here.olp.util", "mapquad", "mapquad.version"),
    (LOCATION, "location-compilation-core_2.11", "location-compilation-core.version"),
    (LOCATION, "location-core_2.11", "location-core.version"),
    (LOCATION, "location-inmemory_2.11", "location-inmemory.version"),
    (
        LOCATION,
        "location-integration-here-commons_2.11",
        "location-integration-here-commons.version",
    ),
    (
        LOCATION,
        "location-integration-optimized-map_2.11",
        "location-integration-optimized-map.version",
    ),
    (
        LOCATION,
        "location-data-loader-standalone_2.11",
        "location-data-loader-standalone.version",
    ),
    (LOCATION, "location-spark_2.11", "location-spark.version"),
    (
        LOCATION,
        "location-compilation-here-map-content_2.11",
        "location-compilation-here-map-content.version",
    ),
    ("com.here.schema.sdii", "sdii_archive_v1_java", "sdii_archive-schema.version"),
    ("com.here.sdii", "sdii_message_v3_java", "sdii-schema.version"),
    ("com.here.sdii", "sdii_message_list_v3_java", "sdii-schema.version"),
    (RIB, "lane-attributes_v2_scala", "rib-schema.version"),
    (RIB, "road-traffic-pattern-attributes_v2_scala", "rib-schema.version"),
    (RIB, "advanced-navigation-attributes_v2_scala", "rib-schema.version"),
    (RIB, "cartography_v2_scala", "rib-schema.version"),
    (RIB, "adas-attributes_v2_scala", "rib-schema.version"),
];

const METADATA_LOOKUPS: &[(&str, &str)] = &[
    (DATA_CLIENT, "spark-support_2.11"),
    (DATA_CLIENT, "data-client_2.11"),
    (DATA_CLIENT, "client-core_2.11"),
    (DATA_CLIENT, "hrn_2.11"),
    (DATA_CLIENT, "data-engine_2.11"),
    (DATA_CLIENT, "blobstore-client_2.11"),
    ("com.here.account", "here-oauth-client"),
    (ANALYTICS, "spark-ds-connector-deps_2.11"),
    (ANALYTICS, "spark-ds-connector_2.11"),
];

const PINS: &[(&str, &str, &str)] = &[
    ("com.typesafe.akka", "akka-actor_2.11", "2.5.11"),
    ("com.beachape", "enumeratum_2.11", "1.5.13"),
    ("com.github.ben-manes.caffeine", "caffeine", "2.6.2"),
    ("com.github.cb372", "scalacache-caffeine_2.11", "0.24.3"),
    ("com.github.cb372", "scalacache-core_2.11", "0.24.3"),
    ("com.github.os72", "protoc-jar", "3.6.0"),
    ("com.google.protobuf", "protobuf-java", "3.6.1"),
    ("com.iheart", "ficus_2.11", "1.4.3"),
    ("com.typesafe", "config", "1.3.3"),
    ("org.apache.logging.log4j", "log4j-api-scala_2.11", "11.0"),
    ("org.typelevel", "cats-core_2.11", "1.4.0"),
    ("org.typelevel", "cats-kernel_2.11", "1.4.0"),
    ("org.apache.logging.log4j", "log4j-api", "2.8.2"),
    (LOCATION, "location-examples-utils_2.11", "0.4.115"),
];

impl ResolutionTables {
    /// The built-in tables for the OLP SDK Spark packages.
    #[must_use]
    pub fn olp_sdk() -> Self {
        Self {
            property_lookups: PROPERTY_LOOKUPS
                .iter()
                .map(|(group, artifact, key)| {
                    PropertyLookup::new(Coordinate::new(*group, *artifact), *key)
                })
                .collect(),
            metadata_lookups: METADATA_LOOKUPS
                .iter()
                .map(|(group, artifact)| Coordinate::new(*group, *artifact))
                .collect(),
            pins: PINS
                .iter()
                .map(|(group, artifact, version)| {
                    VersionedCoordinate::new(Coordinate::new(*group, *artifact), *version)
                })
                .collect(),
        }
    }

    /// Every coordinate named by the tables, in output order.
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.property_lookups
            .iter()
            .map(|lookup| &lookup.coordinate)
            .chain(self.metadata_lookups.iter())
            .chain(self.pins.iter().map(|pin| &pin.coordinate))
    }

    /// Checks that no coordinate appears twice across the tables.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::DuplicateCoordinate`] naming the first
    /// repeated coordinate.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for coordinate in self.coordinates() {
            if !seen.insert(coordinate) {
                return Err(ProvisionError::DuplicateCoordinate {
                    coordinate: coordinate.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn builtin_tables_have_expected_sizes_and_are_disjoint() {
        let tables = ResolutionTables::olp_sdk();
        assert_eq!(tables.property_lookups.len(), 17);
        assert_eq!(tables.metadata_lookups.len(), 9);
        assert_eq!(tables.pins.len(), 14);
        tables.validate().expect("built-in tables are disjoint");
    }

    #[test]
    fn pin_overlapping_metadata_lookup_is_rejected() {
        let mut tables = ResolutionTables::olp_sdk();
        tables.pins.push(VersionedCoordinate::new(
            Coordinate::new("com.here.account", "here-oauth-client"),
            "0.4.13",
        ));
        let err = tables.validate().expect_err("overlap");
        assert!(matches!(
            err,
            ProvisionError::DuplicateCoordinate { coordinate } if coordinate == "com.here.account:here-oauth-client"
        ));
    }

    #[rstest]
    #[case("com.here.olp.util:mapquad", Some(("com.here.olp.util", "mapquad")))]
    #[case("mapquad", None)]
    #[case(":mapquad", None)]
    #[case("a:b:c", None)]
    fn parse_requires_group_and_artifact(
        #[case] value: &str,
        #[case] expected: Option<(&str, &str)>,
    ) {
        let parsed = Coordinate::parse(value);
        assert_eq!(
            parsed.as_ref().map(|c| (c.group(), c.artifact())),
            expected
        );
    }

    #[test]
    fn metadata_url_tolerates_trailing_slash() {
        let coordinate = Coordinate::new("com.here.platform.data.client", "hrn_2.11");
        assert_eq!(
            coordinate.metadata_url("https://r.test/repo/"),
            "https://r.test/repo/com/here/platform/data/client/hrn_2.11/maven-metadata.xml"
        );
    }
}
