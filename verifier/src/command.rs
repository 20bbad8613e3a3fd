//! External tool invocation.
//!
//! Every platform tool (disk-image mounting, installer-database queries,
//! package queries, signature checks) runs through [`CommandExecutor`], so
//! fact collectors can be exercised with a stub instead of real OS tools.

use crate::error::{Result, VerifyError};
use log::debug;
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ToolMissing`] when the executable cannot be
    /// found, [`VerifyError::ExternalToolTimeout`] when a configured timeout
    /// expires, and other I/O errors encountered while spawning or running
    /// the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shipcheck_verifier::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("hdiutil", &["info"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), shipcheck_verifier::error::VerifyError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// Without a timeout, a stalled tool blocks the run. With one, the tool is
/// killed once it expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Creates an executor that kills tools running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        let mut command = Command::new(cmd);
        command.args(args);

        let Some(timeout) = self.timeout else {
            return command.output().map_err(|err| spawn_error(cmd, err));
        };

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(cmd, err))?;

        // Drain both pipes while waiting so a chatty tool cannot fill the
        // pipe buffer and stall until the timeout.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_drain(stdout)?,
                stderr: join_drain(stderr)?,
            }),
            None => {
                kill_quietly(&mut child);
                Err(VerifyError::ExternalToolTimeout {
                    tool: cmd.to_owned(),
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

fn spawn_error(cmd: &str, err: std::io::Error) -> VerifyError {
    if err.kind() == ErrorKind::NotFound {
        VerifyError::ToolMissing {
            tool: cmd.to_owned(),
        }
    } else {
        VerifyError::Io(err)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer).map(|_| buffer)
        })
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| VerifyError::Io(std::io::Error::other("output reader thread panicked")))?
        .map_err(VerifyError::Io)
}

fn kill_quietly(child: &mut Child) {
    if child.kill().is_err() {
        debug!("child already exited before kill");
    }
    if child.wait().is_err() {
        debug!("failed to reap killed child");
    }
}

/// Runs a command and returns its standard output, treating a non-zero exit
/// as [`VerifyError::ExternalTool`].
///
/// # Errors
///
/// Propagates executor errors and reports unsuccessful exits.
pub fn run_checked(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> Result<String> {
    let output = executor.run(cmd, args)?;
    if !output.status.success() {
        return Err(tool_failure(cmd, args, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Builds the error reported for an unsuccessful tool exit.
#[must_use]
pub fn tool_failure(cmd: &str, args: &[&str], output: &Output) -> VerifyError {
    let tool = match args.first() {
        Some(first) if !first.starts_with('-') => format!("{cmd} {first}"),
        _ => cmd.to_owned(),
    };
    VerifyError::ExternalTool {
        tool,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, stdout_output};

    #[test]
    fn run_checked_returns_stdout_on_success() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "lipo",
            &["-archs", "Formula"],
            Ok(stdout_output("x86_64 arm64\n")),
        )]);

        let stdout = run_checked(&executor, "lipo", &["-archs", "Formula"]).expect("success");
        assert_eq!(stdout, "x86_64 arm64\n");
        executor.assert_finished();
    }

    #[test]
    fn run_checked_reports_tool_and_stderr_on_failure() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "hdiutil",
            &["attach", "Formula.dmg"],
            Ok(failure_output("image not recognized")),
        )]);

        let err = run_checked(&executor, "hdiutil", &["attach", "Formula.dmg"])
            .expect_err("failure");
        assert!(matches!(
            err,
            VerifyError::ExternalTool { ref tool, ref stderr, .. }
                if tool == "hdiutil attach" && stderr == "image not recognized"
        ));
        executor.assert_finished();
    }

    #[test]
    fn missing_executable_maps_to_tool_missing() {
        let executor = SystemCommandExecutor::default();
        let err = executor
            .run("shipcheck-definitely-not-a-real-tool", &[])
            .expect_err("tool should not exist");
        assert!(matches!(err, VerifyError::ToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_stalled_tool() {
        let executor = SystemCommandExecutor::with_timeout(Some(Duration::from_millis(100)));
        let err = executor.run("sleep", &["5"]).expect_err("should time out");
        assert!(matches!(err, VerifyError::ExternalToolTimeout { ref tool, .. } if tool == "sleep"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_path_collects_output() {
        let executor = SystemCommandExecutor::with_timeout(Some(Duration::from_secs(10)));
        let output = executor.run("echo", &["hello"]).expect("echo runs");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
