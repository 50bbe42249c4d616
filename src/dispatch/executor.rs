//! Testable process execution for action handlers.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::defaults;
use crate::error::{Result, VocmdError};

/// Captured outcome of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync. Handlers never touch `std::process` directly, so
/// tests can substitute a mock and assert on invocations.
pub trait CommandExecutor: Send + Sync {
    /// Runs a command to completion in the given working directory.
    ///
    /// Returns `Ok` with captured output even when the process exits nonzero;
    /// `Err` only when the process cannot be run at all (not found, spawn
    /// failure, timeout).
    fn execute(&self, command: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput>;
}

/// Production executor using std::process with a hard wall-clock timeout.
#[derive(Debug, Clone)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::ACTION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let mut child = Command::new(command)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VocmdError::ActionFailure {
                        message: format!("Command not found: {}", command),
                    }
                } else {
                    VocmdError::ActionFailure {
                        message: format!("Failed to execute {}: {}", command, e),
                    }
                }
            })?;

        // Poll for completion; actions must not hang the dispatch stage
        // forever on a stuck child.
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(VocmdError::ActionFailure {
                            message: format!(
                                "{} timed out after {}s",
                                command,
                                self.timeout.as_secs()
                            ),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    return Err(VocmdError::ActionFailure {
                        message: format!("Failed waiting for {}: {}", command, e),
                    });
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| VocmdError::ActionFailure {
                message: format!("Failed to collect output of {}: {}", command, e),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_successful_command() {
        let executor = SystemCommandExecutor::new();
        let output = executor
            .execute("echo", &["hello"], Path::new("."))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_is_ok_with_success_false() {
        let executor = SystemCommandExecutor::new();
        let output = executor
            .execute("sh", &["-c", "echo oops >&2; exit 3"], Path::new("."))
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn missing_command_is_an_error() {
        let executor = SystemCommandExecutor::new();
        match executor.execute("definitely-not-a-command-xyz", &[], Path::new(".")) {
            Err(VocmdError::ActionFailure { message }) => {
                assert!(message.contains("not found"));
            }
            other => panic!("expected ActionFailure, got {:?}", other),
        }
    }

    #[test]
    fn timeout_kills_stuck_child() {
        let executor = SystemCommandExecutor::with_timeout(Duration::from_millis(100));
        match executor.execute("sleep", &["5"], Path::new(".")) {
            Err(VocmdError::ActionFailure { message }) => {
                assert!(message.contains("timed out"), "got: {}", message);
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }

    #[test]
    fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SystemCommandExecutor::new();
        let output = executor.execute("pwd", &[], dir.path()).unwrap();
        assert!(output.stdout.trim().ends_with(
            dir.path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
        ));
    }
}
