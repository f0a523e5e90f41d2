//! Shared test utilities for the provisioner crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration tests under `tests/`.

use crate::credentials::Credentials;
use crate::error::{ProvisionError, Result};
use crate::executor::CommandExecutor;
use crate::repository::client::{FetchError, RepositoryClient};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Argument placeholder that matches any value in an [`ExpectedCall`].
pub const ANY_ARG: &str = "<any>";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    output_with_stdout("")
}

/// Creates a successful command `Output` with the given stdout.
pub fn output_with_stdout(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "conda").
    pub cmd: String,
    /// The arguments to pass; [`ANY_ARG`] matches any value.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expects `cmd args...` and answers with `result`.
    pub fn new(cmd: &str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
        }
    }

    fn matches(&self, cmd: &str, args: &[&str]) -> bool {
        self.cmd == cmd
            && self.args.len() == args.len()
            && self
                .args
                .iter()
                .zip(args)
                .all(|(expected, actual)| expected == ANY_ARG || expected == actual)
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Answers expected invocations in order with predefined results and
/// records every invocation it receives.
#[derive(Debug, Default)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    received: RefCell<Vec<Vec<String>>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Every invocation received so far, as `[cmd, args...]`.
    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} remaining: {:?}",
            remaining.len(),
            remaining.iter().map(|call| &call.args).collect::<Vec<_>>()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut invocation = vec![cmd.to_owned()];
        invocation.extend(args.iter().map(|arg| (*arg).to_owned()));
        self.received.borrow_mut().push(invocation);

        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ProvisionError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {}", args.join(" ")),
            })?;

        if !call.matches(cmd, args) {
            return Err(ProvisionError::StubMismatch {
                message: format!(
                    "expected {} {}, got {cmd} {}",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }
        call.result
    }
}

/// Scripted answer for one repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubResponse {
    /// 200 with a text body.
    Text(String),
    /// 200 with a binary body.
    Bytes(Vec<u8>),
    /// 404.
    NotFound,
    /// Any other HTTP status.
    Status(u16),
    /// No response at all.
    Transport(String),
}

/// A stub `RepositoryClient` answering from a URL table.
///
/// Unscripted URLs answer 404. Every request is counted and recorded along
/// with the username it carried.
#[derive(Debug, Default)]
pub struct StubRepository {
    responses: HashMap<String, StubResponse>,
    calls: Cell<usize>,
    requests: RefCell<Vec<(String, String)>>,
}

impl StubRepository {
    /// Creates an empty stub; every URL answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for `url`.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, response: StubResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// Scripts a text body for `url`.
    #[must_use]
    pub fn with_text(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with(url, StubResponse::Text(body.into()))
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    /// URLs requested, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Usernames carried by each request, in order.
    pub fn requested_users(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|(_, user)| user.clone())
            .collect()
    }

    fn answer(&self, url: &str, credentials: &Credentials) -> std::result::Result<Vec<u8>, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.requests
            .borrow_mut()
            .push((url.to_owned(), credentials.username().to_owned()));
        match self.responses.get(url) {
            Some(StubResponse::Text(body)) => Ok(body.as_bytes().to_vec()),
            Some(StubResponse::Bytes(body)) => Ok(body.clone()),
            Some(StubResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_owned(),
                status: *status,
            }),
            Some(StubResponse::Transport(reason)) => Err(FetchError::Transport {
                url: url.to_owned(),
                reason: reason.clone(),
            }),
            Some(StubResponse::NotFound) | None => Err(FetchError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

impl RepositoryClient for StubRepository {
    fn fetch_text(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> std::result::Result<String, FetchError> {
        self.answer(url, credentials)
            .map(|body| String::from_utf8_lossy(&body).into_owned())
    }

    fn download(
        &self,
        url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> std::result::Result<(), FetchError> {
        let body = self.answer(url, credentials)?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}

/// Builds a zip archive in memory from `(name, contents)` pairs.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
#[expect(clippy::expect_used, reason = "test helper")]
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}
