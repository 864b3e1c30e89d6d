//! Semgrep static analysis adapter.
//!
//! Runs `semgrep scan` with the recommended CI ruleset against a
//! checked-out repository and returns the tool's JSON document.

use crate::exec::{tool_on_path, CommandRunner};
use crate::scanner::ScannerError;
use serde_json::Value;
use std::path::Path;
use tracing::info;

const OUTPUT_FILE: &str = "semgrep_results.json";

/// Runs Semgrep against a checked-out repository.
pub struct SemgrepScanner {
    runner: CommandRunner,
}

impl SemgrepScanner {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Run Semgrep and return its native JSON document.
    pub async fn scan(&self, target: &Path) -> Result<Value, ScannerError> {
        info!("Starting Semgrep scan on: {}", target.display());

        if !tool_on_path("semgrep") {
            return Err(ScannerError::ToolUnavailable { tool: "semgrep" });
        }

        // A stale report from an interrupted run would be parsed as
        // current results.
        let output_file = target.join(OUTPUT_FILE);
        if output_file.exists() {
            let _ = std::fs::remove_file(&output_file);
        }

        let output_path = output_file.to_string_lossy().into_owned();
        let target_path = target.to_string_lossy().into_owned();

        let args = [
            "scan",
            "--config",
            "p/ci",
            "--json",
            "--no-git-ignore",
            "--disable-version-check",
            "--jobs",
            "1",
            "-o",
            &output_path,
            &target_path,
        ];

        let result = self.runner.run("semgrep", &args, target).await;
        if !result.success() {
            return Err(ScannerError::ScanFailed {
                tool: "semgrep",
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        if !output_file.exists() {
            return Err(ScannerError::MissingReport { tool: "semgrep" });
        }

        let content = std::fs::read_to_string(&output_file).map_err(|source| {
            ScannerError::UnreadableReport {
                tool: "semgrep",
                source,
            }
        })?;

        serde_json::from_str(&content).map_err(|source| ScannerError::MalformedReport {
            tool: "semgrep",
            source,
        })
    }
}
