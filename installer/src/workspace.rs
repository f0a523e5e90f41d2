//! Scoped scratch directories for downloads and archive rebuilds.
//!
//! A [`TransientWorkspace`] is registered with a [`CleanupRegistry`] the
//! moment it is created and removed exactly once: by [`TransientWorkspace::close`],
//! by `Drop` on any early return or unwind, or by the interrupt handler if
//! the process is interrupted while the workspace is alive. Removing an
//! already-absent directory is not an error.

use crate::error::{ProvisionError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Exit status used when the run is interrupted.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Directories that must be removed if the process is interrupted.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, path: &Path) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
    }

    fn unregister(&self, path: &Path) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| registered != path);
    }

    /// Directories currently registered.
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes every registered directory and empties the registry.
    ///
    /// Returns the number of directories that were removed or already gone.
    pub fn remove_all(&self) -> usize {
        let paths = std::mem::take(&mut *self.paths.lock().unwrap_or_else(PoisonError::into_inner));
        paths
            .iter()
            .filter(|path| match remove_dir_if_present(path) {
                Ok(()) => true,
                Err(err) => {
                    warn!("failed to remove {}: {err}", path.display());
                    false
                }
            })
            .count()
    }
}

/// Installs a Ctrl-C handler that removes every registered workspace and
/// exits with [`INTERRUPTED_EXIT_CODE`].
///
/// # Errors
///
/// Returns [`ProvisionError::Io`] if a handler is already installed.
pub fn install_interrupt_handler(registry: CleanupRegistry) -> Result<()> {
    ctrlc::set_handler(move || {
        let removed = registry.remove_all();
        debug!("interrupted; removed {removed} scratch directories");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
    .map_err(|err| ProvisionError::Io(io::Error::other(err)))
}

/// A scratch directory owned by one run.
#[derive(Debug)]
pub struct TransientWorkspace {
    dir: Option<tempfile::TempDir>,
    path: Utf8PathBuf,
    registry: CleanupRegistry,
}

impl TransientWorkspace {
    /// Creates a fresh directory below `base` and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] if the directory cannot be created.
    pub fn create_in(base: &Utf8Path, registry: &CleanupRegistry) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("sdk-setup-")
            .tempdir_in(base)?;
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf())
            .map_err(|err| ProvisionError::Io(io::Error::other(err)))?;
        registry.register(dir.path());
        debug!("created transient workspace {path}");
        Ok(Self {
            dir: Some(dir),
            path,
            registry: registry.clone(),
        })
    }

    /// Location of the workspace.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Removes the workspace now.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] if removal fails for any reason other
    /// than the directory already being gone.
    pub fn close(mut self) -> Result<()> {
        self.release().map_err(ProvisionError::from)
    }

    fn release(&mut self) -> io::Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        self.registry.unregister(dir.path());
        debug!("removing transient workspace {}", self.path);
        match dir.close() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

impl Drop for TransientWorkspace {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("failed to remove transient workspace {}: {err}", self.path);
        }
    }
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
