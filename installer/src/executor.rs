//! External command execution.
//!
//! The environment manager and the toolchain probe both shell out. Running
//! every subprocess through [`CommandExecutor`] keeps argument vectors
//! explicit (no shell strings are ever interpolated) and lets tests script
//! the results.

use crate::error::{ProvisionError, Result};
use log::debug;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sdk_provisioner::executor::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("conda", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), sdk_provisioner::error::ProvisionError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(ProvisionError::from)
    }
}

/// Lossy UTF-8 view of a command's stdout.
#[must_use]
pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Lossy UTF-8 view of a command's stderr, trimmed.
#[must_use]
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{failure_output, output_with_stdout};

    #[test]
    fn stderr_text_is_trimmed() {
        let output = failure_output("  solver failed\n");
        assert_eq!(stderr_text(&output), "solver failed");
    }

    #[test]
    fn stdout_text_tolerates_invalid_utf8() {
        let mut output = output_with_stdout("conda 4.8.3\n");
        output.stdout.push(0xff);
        assert!(stdout_text(&output).starts_with("conda 4.8.3"));
    }
}
