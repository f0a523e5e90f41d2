//! SDK provisioner library.
//!
//! This crate provisions the OLP SDK for Python conda environment and keeps
//! the Spark dependency list of a notebook config in step with a published
//! SDK release. It backs the `sdk-setup` and `sdk-config-updater` binaries
//! and can be driven programmatically with stub collaborators for testing.
//!
//! # Modules
//!
//! - [`archive`] - Zip extraction and single-entry replacement
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Entry points shared by the binaries
//! - [`config`] - Provisioner settings file
//! - [`context`] - The immutable description of one run
//! - [`credentials`] - Repository credentials from the settings store
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`env_name`] - Validated conda environment names
//! - [`environment`] - The conda environment manager seam
//! - [`error`] - Error types for every failure class
//! - [`executor`] - External command execution
//! - [`logging`] - Logger setup for the binaries
//! - [`output`] - User-facing progress and result messages
//! - [`post_install`] - Windows tutorial and documentation wiring
//! - [`prerequisites`] - Aggregated prerequisite validation
//! - [`provisioner`] - The provisioning state machine
//! - [`release`] - Validated release identifiers
//! - [`repository`] - Repository access and manifest resolution
//! - [`rewriter`] - Dependency-config rewriting with backups
//! - [`templates`] - Generated credential documents
//! - [`toolchain`] - Environment-manager version detection
//! - [`workspace`] - Scoped scratch directories and interrupt cleanup

pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod credentials;
pub mod dirs;
pub mod env_name;
pub mod environment;
pub mod error;
pub mod executor;
pub mod logging;
pub mod output;
pub mod post_install;
pub mod prerequisites;
pub mod provisioner;
pub mod release;
pub mod repository;
pub mod rewriter;
pub mod templates;
pub mod toolchain;
pub mod workspace;

mod xml;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
