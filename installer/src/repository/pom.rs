//! Parsing of the repository's XML documents.
//!
//! Two document shapes are read: the release's parent manifest (a POM whose
//! `properties` block maps version keys to versions) and per-artifact
//! `maven-metadata.xml`. Namespaces are ignored throughout.

use crate::error::{ProvisionError, Result};
use crate::xml;
use std::collections::BTreeMap;

/// Version properties extracted from a parent manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestProperties(BTreeMap<String, String>);

impl ManifestProperties {
    /// Looks up the value of property `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the manifest declared no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManifestProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn parse_error(document: &str, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::Parse {
        document: document.to_owned(),
        reason: reason.into(),
    }
}

fn parse_document<'input>(
    contents: &'input str,
    document: &str,
) -> Result<roxmltree::Document<'input>> {
    roxmltree::Document::parse(contents).map_err(|e| parse_error(document, e.to_string()))
}

/// Extracts the `properties` block of a parent manifest.
///
/// Each child element of the root's `properties` element becomes one entry,
/// keyed by its local name with trimmed text as the value. Elements without
/// text are skipped. A manifest without a `properties` block yields an empty
/// set.
///
/// # Errors
///
/// Returns [`ProvisionError::Parse`] when `contents` is not well-formed XML.
pub fn parse_manifest_properties(contents: &str, document: &str) -> Result<ManifestProperties> {
    let doc = parse_document(contents, document)?;
    let Some(properties) = xml::child(doc.root_element(), "properties") else {
        return Ok(ManifestProperties::default());
    };
    Ok(xml::elements(properties)
        .filter_map(|node| xml::text(node).map(|value| (node.tag_name().name(), value)))
        .collect())
}

/// Extracts the version advertised by an artifact's metadata document.
///
/// Uses the root `version` element, falling back to `versioning/release`
/// and then `versioning/latest`.
///
/// # Errors
///
/// Returns [`ProvisionError::Parse`] when the document is malformed or
/// names no version.
pub fn parse_metadata_version(contents: &str, document: &str) -> Result<String> {
    let doc = parse_document(contents, document)?;
    let root = doc.root_element();
    let versioning = xml::child(root, "versioning");
    xml::child(root, "version")
        .and_then(xml::text)
        .or_else(|| versioning.and_then(|v| xml::child(v, "release")).and_then(xml::text))
        .or_else(|| versioning.and_then(|v| xml::child(v, "latest")).and_then(xml::text))
        .map(str::to_owned)
        .ok_or_else(|| parse_error(document, "no version element"))
}
