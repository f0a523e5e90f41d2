//! Zip archive handling.
//!
//! Extracts the environment specification archive with path traversal
//! protection, and supports replacing a single entry of an existing archive
//! while copying every other entry unchanged.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path};

/// Trait for extracting downloaded archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the relative paths of the extracted files.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ArchiveError::EmptyArchive`] if
    /// no files are found, and [`ArchiveError::Io`] or
    /// [`ArchiveError::Format`] on read failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ArchiveError>;
}

/// Errors arising from archive handling.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// I/O error while reading or writing.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a readable zip archive.
    #[error("invalid zip archive: {0}")]
    Format(String),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// No entry with the requested file name exists.
    #[error("archive has no entry named {name}")]
    MissingEntry {
        /// The file name that was looked for.
        name: String,
    },
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Format(other.to_string()),
        }
    }
}

/// Default extractor backed by the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ArchiveError> {
        let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
        let mut extracted = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_owned();
            validate_entry_path(Path::new(&name))?;

            let dest_path = dest_dir.join(&name);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest_path)?;
            std::io::copy(&mut entry, &mut out)?;
            extracted.push(name);
        }

        if extracted.is_empty() {
            return Err(ArchiveError::EmptyArchive);
        }
        Ok(extracted)
    }
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ArchiveError> {
    let escapes = path.is_absolute()
        || path.has_root()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ArchiveError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Reads the first file entry whose final path segment is `file_name`.
///
/// Returns the entry's full name and its contents.
///
/// # Errors
///
/// Returns [`ArchiveError::MissingEntry`] when no entry matches, or an
/// I/O or format error when the archive cannot be read.
pub fn read_named_entry(
    archive_path: &Path,
    file_name: &str,
) -> Result<(String, Vec<u8>), ArchiveError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || entry_file_name(entry.name()) != file_name {
            continue;
        }
        let name = entry.name().to_owned();
        validate_entry_path(Path::new(&name))?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        return Ok((name, contents));
    }
    Err(ArchiveError::MissingEntry {
        name: file_name.to_owned(),
    })
}

/// Writes a copy of `source` to `dest` with entry `entry_name` replaced by
/// `contents`. Every other entry is copied without recompression.
///
/// # Errors
///
/// Returns an I/O or format error when either archive cannot be processed,
/// or [`ArchiveError::MissingEntry`] when `entry_name` is absent.
pub fn replace_entry(
    source: &Path,
    dest: &Path,
    entry_name: &str,
    contents: &[u8],
) -> Result<(), ArchiveError> {
    let mut archive = zip::ZipArchive::new(File::open(source)?)?;
    let mut writer = zip::ZipWriter::new(File::create(dest)?);
    let mut replaced = false;

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.name() == entry_name {
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(entry.compression());
            writer.start_file(entry_name, options)?;
            writer.write_all(contents)?;
            replaced = true;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }

    if !replaced {
        return Err(ArchiveError::MissingEntry {
            name: entry_name.to_owned(),
        });
    }
    writer.finish()?;
    Ok(())
}

fn entry_file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
