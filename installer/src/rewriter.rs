//! Rewrites the Spark dependency list in the notebook config document.
//!
//! The document is `config.json`, either loose in the working directory or
//! inside `spark-conf-files.zip`. It is parsed as a generic JSON value and
//! only `session_configs.conf."spark.jars.packages"` is replaced in place;
//! every other key keeps its position and its exact numeric text. The
//! original bytes are copied to a backup next to the source before anything
//! is written.

use crate::archive::{self, ArchiveError};
use crate::error::{ProvisionError, Result};
use crate::repository::ResolvedManifest;
use crate::workspace::{CleanupRegistry, TransientWorkspace};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde_json::Value;
use std::fs::File;
use std::io::Write;

/// Name of the loose config document.
pub const LOOSE_CONFIG: &str = "config.json";
/// Name of the config archive.
pub const CONFIG_ARCHIVE: &str = "spark-conf-files.zip";
/// Backup name for a loose config document.
pub const LOOSE_BACKUP: &str = "original_config.json";
/// Backup name for a config archive.
pub const ARCHIVE_BACKUP: &str = "original_spark-conf-files.zip";

/// Keys leading to the dependency list.
const PACKAGES_PATH: [&str; 3] = ["session_configs", "conf", "spark.jars.packages"];

/// Where the config document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A loose `config.json`.
    Loose(Utf8PathBuf),
    /// A `spark-conf-files.zip` containing `config.json`.
    Archive(Utf8PathBuf),
}

impl ConfigSource {
    /// Looks for the config in `dir`; a loose document wins over an archive.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NoConfigFound`] when neither exists.
    pub fn discover(dir: &Utf8Path) -> Result<Self> {
        let loose = dir.join(LOOSE_CONFIG);
        if loose.is_file() {
            return Ok(Self::Loose(loose));
        }
        let archive = dir.join(CONFIG_ARCHIVE);
        if archive.is_file() {
            return Ok(Self::Archive(archive));
        }
        Err(ProvisionError::NoConfigFound {
            dir: dir.to_owned(),
            loose: LOOSE_CONFIG,
            archive: CONFIG_ARCHIVE,
        })
    }

    /// Path of the loose document or the archive.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Loose(path) | Self::Archive(path) => path,
        }
    }

    /// Where the pre-rewrite copy is stored.
    #[must_use]
    pub fn backup_path(&self) -> Utf8PathBuf {
        let name = match self {
            Self::Loose(_) => LOOSE_BACKUP,
            Self::Archive(_) => ARCHIVE_BACKUP,
        };
        self.path()
            .parent()
            .map_or_else(|| Utf8PathBuf::from(name), |dir| dir.join(name))
    }
}

/// Result of a successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// The rewritten document or archive.
    pub target: Utf8PathBuf,
    /// The backup of the original.
    pub backup: Utf8PathBuf,
    /// Number of packages written.
    pub packages: usize,
}

/// Replaces the dependency list of a config source.
#[derive(Debug, Clone, Copy)]
pub struct DependencyFileRewriter<'a> {
    registry: &'a CleanupRegistry,
}

impl<'a> DependencyFileRewriter<'a> {
    /// Creates a rewriter; archive rebuilds register their scratch
    /// directory with `registry`.
    #[must_use]
    pub fn new(registry: &'a CleanupRegistry) -> Self {
        Self { registry }
    }

    /// Backs up `source` and replaces its dependency list with `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MalformedConfig`] when the document lacks
    /// the dependency field (nothing is written in that case), and
    /// [`ProvisionError::Write`] when the backup or the output cannot be
    /// written.
    pub fn rewrite(&self, source: &ConfigSource, manifest: &ResolvedManifest) -> Result<WriteResult> {
        let backup = source.backup_path();
        match source {
            ConfigSource::Loose(path) => {
                let original = std::fs::read(path)?;
                let rewritten = rewrite_document(&original, manifest, path.as_str())?;
                backup_copy(path, &backup)?;
                write_atomically(path, &rewritten)?;
            }
            ConfigSource::Archive(path) => self.rewrite_archive(path, &backup, manifest)?,
        }
        info!("wrote {} packages to {}", manifest.len(), source.path());
        Ok(WriteResult {
            target: source.path().to_owned(),
            backup,
            packages: manifest.len(),
        })
    }

    fn rewrite_archive(
        &self,
        path: &Utf8Path,
        backup: &Utf8Path,
        manifest: &ResolvedManifest,
    ) -> Result<()> {
        let (entry, original) = archive::read_named_entry(path.as_std_path(), LOOSE_CONFIG)
            .map_err(|err| archive_error(path, err))?;
        let document = format!("{path}!{entry}");
        let rewritten = rewrite_document(&original, manifest, &document)?;
        backup_copy(path, backup)?;

        let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let workspace = TransientWorkspace::create_in(dir, self.registry)?;
        let rebuilt = workspace.path().join(CONFIG_ARCHIVE);
        debug!("rebuilding {path} in {rebuilt}");
        archive::replace_entry(
            path.as_std_path(),
            rebuilt.as_std_path(),
            &entry,
            &rewritten,
        )
        .map_err(|err| archive_error(path, err))?;
        std::fs::rename(&rebuilt, path).map_err(|err| write_error(path, &err))?;
        workspace.close()
    }
}

/// Replaces the dependency list in a JSON document.
///
/// Returns the pretty-printed document with every key in its original
/// order.
///
/// # Errors
///
/// Returns [`ProvisionError::MalformedConfig`] naming `document` when the
/// input is not JSON or lacks `session_configs.conf."spark.jars.packages"`.
pub fn rewrite_document(
    contents: &[u8],
    manifest: &ResolvedManifest,
    document: &str,
) -> Result<Vec<u8>> {
    let malformed = |reason: String| ProvisionError::MalformedConfig {
        path: document.to_owned(),
        reason,
    };
    let mut config: Value =
        serde_json::from_slice(contents).map_err(|err| malformed(err.to_string()))?;
    *packages_field(&mut config).map_err(malformed)? = Value::String(manifest.packages_field());
    serde_json::to_vec_pretty(&config).map_err(|err| malformed(err.to_string()))
}

fn packages_field(config: &mut Value) -> std::result::Result<&mut Value, String> {
    let mut node = config;
    for (depth, key) in PACKAGES_PATH.iter().enumerate() {
        let object = node
            .as_object_mut()
            .ok_or_else(|| format!("{} is not an object", path_label(depth)))?;
        node = object
            .get_mut(*key)
            .ok_or_else(|| format!("{} is missing", path_label(depth + 1)))?;
    }
    if node.is_string() {
        Ok(node)
    } else {
        Err(format!("{} is not a string", path_label(PACKAGES_PATH.len())))
    }
}

fn path_label(depth: usize) -> String {
    if depth == 0 {
        return "the document root".to_owned();
    }
    PACKAGES_PATH
        .iter()
        .take(depth)
        .map(|key| if key.contains('.') { format!("\"{key}\"") } else { (*key).to_owned() })
        .collect::<Vec<_>>()
        .join(".")
}

fn backup_copy(source: &Utf8Path, backup: &Utf8Path) -> Result<()> {
    std::fs::copy(source, backup)
        .and_then(|_| File::open(backup)?.sync_all())
        .map_err(|err| write_error(backup, &err))?;
    info!("saved {source} as {backup}");
    Ok(())
}

fn write_atomically(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let permissions = std::fs::metadata(path)
        .map_err(|err| write_error(path, &err))?
        .permissions();
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|err| write_error(path, &err))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().set_permissions(permissions))
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| write_error(path, &err))?;
    file.persist(path)
        .map_err(|err| write_error(path, &err.error))?;
    Ok(())
}

fn write_error(path: &Utf8Path, err: &std::io::Error) -> ProvisionError {
    ProvisionError::Write {
        path: path.to_owned(),
        reason: err.to_string(),
    }
}

fn archive_error(path: &Utf8Path, err: ArchiveError) -> ProvisionError {
    match err {
        ArchiveError::Io(io) => ProvisionError::Io(io),
        other => ProvisionError::MalformedConfig {
            path: path.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "rewriter_tests.rs"]
mod tests;
