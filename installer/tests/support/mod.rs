//! Test support utilities for provisioner integration tests.
//!
//! A [`Sandbox`] is a temporary home directory holding the platform
//! credential files, a scratch directory for transient workspaces, and a
//! working directory for dependency-config documents.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use camino::{Utf8Path, Utf8PathBuf};
use sdk_provisioner::commands::resolve_paths;
use sdk_provisioner::config::ProvisionerConfig;
use sdk_provisioner::context::{Operation, Platform, RunContext};
use sdk_provisioner::dirs::{FixedBaseDirs, SdkPaths};
use sdk_provisioner::test_utils::{ExpectedCall, output_with_stdout, success_output, zip_bytes};
use tempfile::TempDir;

/// Repository URL configured in the sandbox settings store.
pub const REPO: &str = "https://repo.example.test/olp";

/// Location of the environment specification inside the archive.
pub const SPEC_ENTRY: &str = "conda-env-files/olp_sdk_for_python_env.yml";

/// Settings store with credentials and a repository profile.
pub const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<settings xmlns="http://maven.apache.org/SETTINGS/1.0.0">
  <servers>
    <server>
      <id>HERE_PLATFORM_REPO</id>
      <username>analyst</username>
      <password>p@ss word</password>
    </server>
  </servers>
  <profiles>
    <profile>
      <repositories>
        <repository>
          <url>https://repo.example.test/olp/</url>
        </repository>
      </repositories>
    </profile>
  </profiles>
</settings>"#;

/// Settings store whose server block has no password.
pub const SETTINGS_WITHOUT_PASSWORD: &str = r#"<settings>
  <servers><server><username>analyst</username></server></servers>
  <profiles><profile><repositories><repository>
    <url>https://repo.example.test/olp</url>
  </repository></repositories></profile></profiles>
</settings>"#;

/// Notebook config with a stale dependency list.
pub const CONFIG_JSON: &str = r#"{
  "kernel_python_credentials": {
    "url": "http://localhost:8998"
  },
  "session_configs": {
    "driverMemory": "1000M",
    "conf": {
      "spark.jars.packages": "com.here.olp.util:mapquad:0.0.1"
    }
  }
}"#;

/// A temporary home with every prerequisite file in place.
pub struct Sandbox {
    _temp: TempDir,
    /// Root of the sandbox.
    pub root: Utf8PathBuf,
    /// SDK paths below the sandbox home.
    pub paths: SdkPaths,
    /// Directory transient workspaces are created in.
    pub scratch: Utf8PathBuf,
    /// Directory holding dependency-config documents.
    pub work: Utf8PathBuf,
}

impl Sandbox {
    /// Creates a sandbox with credential files and settings store.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        let paths = resolve_paths(&FixedBaseDirs::new(root.join("home"))).expect("home resolves");
        for file in paths.required_credential_files() {
            write(&file, "");
        }
        write(&paths.settings_store(), SETTINGS);
        let scratch = root.join("scratch");
        let work = root.join("work");
        std::fs::create_dir_all(&scratch).expect("create scratch");
        std::fs::create_dir_all(&work).expect("create work");
        Self {
            _temp: temp,
            root,
            paths,
            scratch,
            work,
        }
    }

    /// Where the manager reports environment `name`.
    pub fn env_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join("envs").join(name)
    }

    /// `conda env list` output listing `base` and each of `names`.
    pub fn env_list(&self, names: &[&str]) -> String {
        let mut listing = format!("# conda environments:\n#\nbase  *  {}\n", self.root.join("conda"));
        for name in names {
            listing.push_str(&format!("{name}    {}\n", self.env_path(name)));
        }
        listing
    }

    /// A POSIX run context for `operation` on environment `name`.
    pub fn context(&self, operation: Operation, name: &str) -> RunContext {
        RunContext::new(operation, Some("1.5"), Some(name), ProvisionerConfig::default())
            .expect("valid context")
            .with_platform(Platform::Posix)
            .with_quiet(true)
            .with_scratch_dir(self.scratch.clone())
    }

    /// Number of entries left in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.scratch)
            .expect("scratch readable")
            .count()
    }

    /// Replaces the settings store contents.
    pub fn write_settings(&self, contents: &str) {
        write(&self.paths.settings_store(), contents);
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write(path: &Utf8Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, contents).expect("write file");
}

/// URL of the default specification archive for release 1.5.
pub fn spec_archive_url() -> String {
    ProvisionerConfig::default().spec_archive_url("1.5")
}

/// A specification archive containing the environment file.
pub fn spec_archive() -> Vec<u8> {
    zip_bytes(&[
        (SPEC_ENTRY, "name: olp-sdk\ndependencies:\n  - python=3.7\n"),
        ("conda-env-files/README.md", "environment files"),
    ])
}

/// Scripted conda calls for a run where the manager is healthy and the
/// environment `name` exists (`exists`) or is created.
pub fn healthy_conda(sandbox: &Sandbox, name: &str, exists: bool) -> Vec<ExpectedCall> {
    let mut calls = vec![ExpectedCall::new(
        "conda",
        &["--version"],
        Ok(output_with_stdout("conda 4.8.3\n")),
    )];
    if exists {
        calls.push(list_call(sandbox, &[name]));
    } else {
        calls.push(list_call(sandbox, &[]));
        calls.push(ExpectedCall::new("conda", &["create", "-y", "-n", name], Ok(success_output())));
        calls.push(list_call(sandbox, &[name]));
    }
    calls.push(ExpectedCall::new(
        "conda",
        &["env", "update", "-n", name, "-f", sdk_provisioner::test_utils::ANY_ARG],
        Ok(success_output()),
    ));
    calls
}

/// A scripted `conda env list` call.
pub fn list_call(sandbox: &Sandbox, names: &[&str]) -> ExpectedCall {
    ExpectedCall::new(
        "conda",
        &["env", "list"],
        Ok(output_with_stdout(&sandbox.env_list(names))),
    )
}

/// A parent manifest with the given properties.
pub fn pom(properties: &[(&str, &str)]) -> String {
    let body: String = properties
        .iter()
        .map(|(key, value)| format!("    <{key}>{value}</{key}>\n"))
        .collect();
    format!(
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n  <properties>\n{body}  </properties>\n</project>\n"
    )
}

/// A metadata document reporting `version`.
pub fn metadata(version: &str) -> String {
    format!("<metadata><versioning><release>{version}</release></versioning></metadata>")
}
