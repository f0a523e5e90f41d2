//! Directory resolution abstraction for platform-specific paths.
//!
//! The provisioner reads and writes a handful of files below the user's home
//! directory. Resolving them through [`BaseDirs`] lets tests point the whole
//! run at a temporary home.

use camino::{Utf8Path, Utf8PathBuf};

/// Source of the base directories the provisioner depends on.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Returns the user's home directory, if it can be determined.
    fn home_dir(&self) -> Option<Utf8PathBuf>;
}

/// Resolves directories from the host system via `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.home_dir().to_path_buf()).ok())
    }
}

/// Reports a fixed home directory.
#[derive(Debug, Clone)]
pub struct FixedBaseDirs {
    home: Utf8PathBuf,
}

impl FixedBaseDirs {
    /// Creates a resolver that always reports `home`.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl BaseDirs for FixedBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        Some(self.home.clone())
    }
}

/// Well-known SDK file locations below a home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkPaths {
    home: Utf8PathBuf,
}

impl SdkPaths {
    /// Resolves the SDK paths from `dirs`.
    ///
    /// Returns `None` when no home directory is available.
    pub fn resolve(dirs: &dyn BaseDirs) -> Option<Self> {
        dirs.home_dir().map(Self::from_home)
    }

    /// Builds the SDK paths below an explicit home directory.
    #[must_use]
    pub fn from_home(home: Utf8PathBuf) -> Self {
        Self { home }
    }

    /// The user's home directory.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// Maven settings store holding repository credentials.
    #[must_use]
    pub fn settings_store(&self) -> Utf8PathBuf {
        self.home.join(".m2").join("settings.xml")
    }

    /// Directory holding the platform credential files.
    #[must_use]
    pub fn here_dir(&self) -> Utf8PathBuf {
        self.home.join(".here")
    }

    /// Files that must exist before provisioning can start.
    #[must_use]
    pub fn required_credential_files(&self) -> Vec<Utf8PathBuf> {
        vec![
            self.here_dir().join("credentials.properties"),
            self.here_dir().join("hls_credentials.properties"),
            self.settings_store(),
        ]
    }

    /// Ivy resolver configuration used by Spark inside the environment.
    #[must_use]
    pub fn resolver_config(&self) -> Utf8PathBuf {
        self.here_dir().join("ivy.settings.xml")
    }

    /// Optional settings file for the provisioner itself.
    #[must_use]
    pub fn provisioner_config(&self) -> Utf8PathBuf {
        self.here_dir().join("sdk-setup.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn paths() -> SdkPaths {
        SdkPaths::from_home(Utf8PathBuf::from("/home/analyst"))
    }

    #[rstest]
    fn settings_store_lives_under_m2(paths: SdkPaths) {
        assert_eq!(
            paths.settings_store(),
            Utf8PathBuf::from("/home/analyst/.m2/settings.xml")
        );
    }

    #[rstest]
    fn required_files_include_settings_store(paths: SdkPaths) {
        let files = paths.required_credential_files();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&paths.settings_store()));
        assert!(files.iter().any(|f| f.ends_with("hls_credentials.properties")));
    }

    #[rstest]
    fn fixed_dirs_resolve_paths() {
        let dirs = FixedBaseDirs::new("/tmp/home");
        let paths = SdkPaths::resolve(&dirs).expect("fixed dirs always resolve");
        assert_eq!(
            paths.resolver_config(),
            Utf8PathBuf::from("/tmp/home/.here/ivy.settings.xml")
        );
    }
}
