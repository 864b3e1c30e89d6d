//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.secweave.toml` files. Secrets (synthesis API key, GitHub token)
//! never live in the file; they reach the program via CLI flags or
//! environment variables only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Synthesis backend settings.
    #[serde(default)]
    pub synthesis: SynthesisSection,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Report settings.
    #[serde(default)]
    pub report: ReportSection,
}

/// AI synthesis backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSection {
    /// Chat completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in the synthesized report.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_synthesis_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_synthesis_timeout() -> u64 {
    120
}

/// Scan pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Cap on each scanner subprocess, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

fn default_command_timeout() -> u64 {
    300
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    /// Attach source-context windows to code findings.
    #[serde(default = "default_true")]
    pub include_snippets: bool,

    /// Lines of context on each side of a finding.
    #[serde(default = "default_context_lines")]
    pub snippet_context_lines: usize,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            include_snippets: true,
            snippet_context_lines: default_context_lines(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_context_lines() -> usize {
    15
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".secweave.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.synthesis.model = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.synthesis.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.synthesis.timeout_seconds = timeout;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
