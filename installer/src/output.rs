//! User-facing output for the provisioner binaries.
//!
//! Progress lines and final messages go to stderr; diagnostics go through
//! the `log` facade instead.

use crate::environment::EnvironmentBranch;
use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;
use std::time::Duration;

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Progress sink that honours `--quiet`.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Wraps `stderr`; when `quiet` is set only errors are written.
    pub fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// Reports a progress step.
    pub fn step(&mut self, message: impl Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, message);
        }
    }
}

/// Maps a run result to a process exit code, printing any error.
///
/// Returns 0 on success and 1 for every failure class.
pub fn exit_code_for_run_result<T, E: Display>(
    result: Result<T, E>,
    stderr: &mut dyn Write,
) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

/// Formats the download timing line.
#[must_use]
pub fn download_message(url: &str, elapsed: Duration) -> String {
    format!(
        "Downloaded {url} in {:.2} seconds",
        elapsed.as_secs_f64()
    )
}

/// Formats the final message of an install or update run.
#[must_use]
pub fn provision_message(environment: &str, branch: EnvironmentBranch) -> String {
    match branch {
        EnvironmentBranch::Created => {
            format!("Environment {environment} created and configured successfully.")
        }
        EnvironmentBranch::Updated => {
            format!("Environment {environment} updated successfully.")
        }
    }
}

/// Formats the final message of a dependency-config update.
#[must_use]
pub fn rewrite_message(count: usize, target: &Utf8Path, backup: &Utf8Path) -> String {
    let plural = if count == 1 { "package" } else { "packages" };
    format!("Updated {target} with {count} {plural} (original saved as {backup})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use rstest::rstest;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok::<(), ProvisionError>(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = ProvisionError::ReleaseNotFound {
            release: "9.9".to_owned(),
        };
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err::<(), _>(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains("release version 9.9 cannot be found"));
    }

    #[rstest]
    #[case::loud(false, true)]
    #[case::quiet(true, false)]
    fn progress_respects_quiet(#[case] quiet: bool, #[case] expect_output: bool) {
        let mut buffer = Vec::new();
        Progress::new(&mut buffer, quiet).step("Downloading");
        assert_eq!(!buffer.is_empty(), expect_output);
    }

    #[rstest]
    #[case::singular(1, "1 package")]
    #[case::plural(3, "3 packages")]
    fn rewrite_message_pluralises(#[case] count: usize, #[case] expected: &str) {
        let msg = rewrite_message(
            count,
            Utf8Path::new("config.json"),
            Utf8Path::new("original_config.json"),
        );
        assert!(msg.contains(expected));
    }

    #[test]
    fn download_message_reports_seconds() {
        let msg = download_message("https://repo.example.test/a.zip", Duration::from_millis(1500));
        assert!(msg.ends_with("in 1.50 seconds"));
    }
}
