//! Subprocess execution with timeouts.
//!
//! External scanners run as child processes. The runner captures their
//! output and flattens timeouts and spawn failures into the exit status,
//! so callers deal with one shape regardless of how the command died.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info};

/// Default cap on scanner subprocess runtime, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Captured result of a finished (or failed) command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code; -1 when the process timed out or never started.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command completed with exit code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes commands with a timeout, capturing their output.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT_SECS)
    }
}

impl CommandRunner {
    /// Create a runner that caps each command at `timeout_secs` seconds.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run a command to completion, capturing stdout and stderr.
    ///
    /// Never fails: a timeout or spawn error is reported as exit code -1
    /// with the cause in `stderr`. The child is killed on timeout.
    pub async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> CommandOutput {
        info!("Executing: {} {} in {}", program, args.join(" "), cwd.display());

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Failed to execute command {}: {}", program, e);
                return CommandOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                };
            }
            Err(_) => {
                error!(
                    "Command timed out after {}s: {}",
                    self.timeout.as_secs(),
                    program
                );
                return CommandOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: "Command timed out".to_string(),
                };
            }
        };

        CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Check whether an executable with the given name is reachable via PATH.
pub fn tool_on_path(name: &str) -> bool {
    match std::env::var_os("PATH") {
        Some(paths) => std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()),
        None => false,
    }
}
