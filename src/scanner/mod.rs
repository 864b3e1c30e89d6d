//! Scanner adapters for the external analysis tools.
//!
//! Each adapter knows how to invoke one tool against a prepared target
//! and hand back the tool's native JSON document. Converting those
//! documents into canonical issues is the report builder's job.

pub mod codeql;
pub mod semgrep;
pub mod zap;

pub use codeql::CodeQlScanner;
pub use semgrep::SemgrepScanner;
pub use zap::ZapScanner;

use thiserror::Error;

/// Failure of a single scanner invocation.
///
/// Any of these degrades the scan (that tool's results are skipped)
/// rather than aborting the pipeline.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("{tool} is not installed or not in PATH")]
    ToolUnavailable { tool: &'static str },

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    ScanFailed {
        tool: &'static str,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} did not produce a report")]
    MissingReport { tool: &'static str },

    #[error("failed to read {tool} output: {source}")]
    UnreadableReport {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("failed to parse {tool} output: {source}")]
    MalformedReport {
        tool: &'static str,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_tool() {
        let err = ScannerError::ToolUnavailable { tool: "semgrep" };
        assert!(err.to_string().contains("semgrep"));

        let err = ScannerError::ScanFailed {
            tool: "codeql",
            exit_code: 2,
            stderr: "out of memory".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("codeql"));
        assert!(message.contains("2"));
        assert!(message.contains("out of memory"));
    }
}
