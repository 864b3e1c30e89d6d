//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::ScanTarget;
use clap::Parser;
use std::path::PathBuf;

/// Secweave - multi-scanner security report aggregator
///
/// Scan a repository with Semgrep and CodeQL, a live deployment with
/// OWASP ZAP, and merge everything into one classified report, rewritten
/// by an AI backend when one is configured.
///
/// Examples:
///   secweave --repo https://github.com/owner/repo.git
///   secweave --deploy-url https://staging.example.com --format json
///   secweave --repo https://github.com/owner/repo.git --offline
///   secweave --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Git repository URL to clone and statically analyze
    ///
    /// Supports HTTPS URLs (e.g., https://github.com/owner/repo.git).
    /// At least one of --repo and --deploy-url is required.
    #[arg(short, long, value_name = "URL")]
    pub repo: Option<String>,

    /// Deployment URL to scan dynamically with OWASP ZAP
    #[arg(short, long, value_name = "URL")]
    pub deploy_url: Option<String>,

    /// Output file path for the report
    #[arg(
        short,
        long,
        default_value = "secweave_report.md",
        value_name = "FILE"
    )]
    pub output: PathBuf,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also write the raw per-tool payloads as JSON to this path
    #[arg(long, value_name = "FILE")]
    pub raw_output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .secweave.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model to use for report synthesis
    #[arg(short, long, env = "SECWEAVE_MODEL", value_name = "MODEL")]
    pub model: Option<String>,

    /// Chat completions endpoint for report synthesis
    #[arg(long, env = "SECWEAVE_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// API key for the synthesis backend
    ///
    /// Without a key, synthesis fails over to the deterministic
    /// normalization engine.
    #[arg(long, env = "SECWEAVE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Synthesis request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// GitHub token injected into clone URLs for private repositories
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Skip the synthesis backend entirely
    ///
    /// The deterministic normalization engine produces the report.
    #[arg(long)]
    pub offline: bool,

    /// Fail if issues at or above this severity are found
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    /// Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .secweave.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Severity level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The scan target described by the arguments.
    pub fn scan_target(&self) -> ScanTarget {
        ScanTarget {
            repo_url: self.repo.clone(),
            deploy_url: self.deploy_url.clone(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.repo.is_none() && self.deploy_url.is_none() {
            return Err("At least one of --repo or --deploy-url is required".to_string());
        }

        if let Some(ref repo) = self.repo {
            if !repo.starts_with("https://") && !repo.starts_with("git@") {
                return Err("Repository URL must start with 'https://' or 'git@'".to_string());
            }
        }

        if let Some(ref deploy) = self.deploy_url {
            if !deploy.starts_with("http://") && !deploy.starts_with("https://") {
                return Err("Deploy URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            repo: Some("https://github.com/test/repo".to_string()),
            deploy_url: None,
            output: PathBuf::from("test.md"),
            format: OutputFormat::Markdown,
            raw_output: None,
            config: None,
            model: None,
            api_url: None,
            api_key: None,
            timeout: None,
            github_token: None,
            offline: false,
            fail_on: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_requires_a_target() {
        let mut args = make_args();
        args.repo = None;
        assert!(args.validate().is_err());

        args.deploy_url = Some("https://shop.example.com".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_repo_url() {
        let mut args = make_args();
        args.repo = Some("invalid-url".to_string());
        assert!(args.validate().is_err());

        args.repo = Some("git@github.com:test/repo.git".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_deploy_url() {
        let mut args = make_args();
        args.deploy_url = Some("ftp://shop.example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_target_validation() {
        let mut args = make_args();
        args.repo = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_scan_target_mirrors_args() {
        let mut args = make_args();
        args.deploy_url = Some("https://shop.example.com".to_string());

        let target = args.scan_target();
        assert_eq!(target.repo_url.as_deref(), Some("https://github.com/test/repo"));
        assert_eq!(target.deploy_url.as_deref(), Some("https://shop.example.com"));
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
