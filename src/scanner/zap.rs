//! OWASP ZAP dynamic analysis adapter.
//!
//! Runs the ZAP baseline scan against a live deployment. Inside the
//! bundled container image the baseline script is invoked directly;
//! on a workstation we fall back to the official Docker image.

use crate::exec::{tool_on_path, CommandRunner};
use crate::scanner::ScannerError;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

const BUNDLED_SCRIPT: &str = "/zap/zap-baseline.py";
const REPORT_NAME: &str = "zap_report.json";

/// Runs the OWASP ZAP baseline scan against a deployment URL.
pub struct ZapScanner {
    runner: CommandRunner,
}

impl ZapScanner {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Run the baseline scan and return ZAP's native JSON report.
    pub async fn scan(&self, target_url: &str) -> Result<Value, ScannerError> {
        info!("Starting OWASP ZAP scan on {}", target_url);

        let work_dir = TempDir::new().map_err(|source| ScannerError::UnreadableReport {
            tool: "zap",
            source,
        })?;
        let work_path = work_dir.path();
        let report_path = work_path.join(REPORT_NAME);

        let (program, args) = baseline_command(target_url, work_path);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let result = self.runner.run(program, &arg_refs, work_path).await;
        if !result.success() {
            // Baseline scans exit non-zero when they find warnings; the
            // report is still written in that case.
            warn!(
                "ZAP exited with code {}: {}",
                result.exit_code, result.stderr
            );
        }

        if !report_path.exists() {
            return Err(ScannerError::MissingReport { tool: "zap" });
        }

        let content = std::fs::read_to_string(&report_path).map_err(|source| {
            ScannerError::UnreadableReport {
                tool: "zap",
                source,
            }
        })?;

        serde_json::from_str(&content).map_err(|source| ScannerError::MalformedReport {
            tool: "zap",
            source,
        })
    }
}

/// Pick how to invoke the baseline scan on this host.
fn baseline_command(target_url: &str, work_path: &Path) -> (&'static str, Vec<String>) {
    if Path::new(BUNDLED_SCRIPT).exists() {
        info!("ZAP baseline script found at {}", BUNDLED_SCRIPT);
        return (
            "python3",
            vec![
                BUNDLED_SCRIPT.to_string(),
                "-t".to_string(),
                target_url.to_string(),
                "-J".to_string(),
                REPORT_NAME.to_string(),
                "-sort".to_string(),
                "false".to_string(),
            ],
        );
    }

    if tool_on_path("zap-baseline.py") {
        info!("ZAP baseline script found in PATH");
        return (
            "zap-baseline.py",
            vec![
                "-t".to_string(),
                target_url.to_string(),
                "-J".to_string(),
                REPORT_NAME.to_string(),
            ],
        );
    }

    warn!("ZAP baseline script not found, falling back to Docker");
    (
        "docker",
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/zap/wrk/:rw", work_path.display()),
            "ghcr.io/zaproxy/zaproxy:stable".to_string(),
            "zap-baseline.py".to_string(),
            "-t".to_string(),
            target_url.to_string(),
            "-J".to_string(),
            REPORT_NAME.to_string(),
        ],
    )
}
