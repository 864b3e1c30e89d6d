//! Secweave - multi-scanner security report aggregator
//!
//! A CLI tool that runs Semgrep, CodeQL and OWASP ZAP against a
//! repository and/or live deployment, merges their findings into one
//! canonical report, and classifies it either via an AI synthesis
//! backend or a deterministic fallback engine.
//!
//! Exit codes:
//!   0 - Success (no issues above threshold, or no --fail-on set)
//!   1 - Runtime error (fatal pipeline failure, config error, etc.)
//!   2 - Issues found at or above --fail-on threshold

mod cli;
mod config;
mod exec;
mod models;
mod pipeline;
mod report;
mod scanner;
mod synthesis;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, FailOnLevel, OutputFormat};
use config::Config;
use models::{ScanOutcome, Severity};
use pipeline::{PipelineOptions, ScanPipeline};
use report::render::{render_json, render_markdown, RenderContext};
use std::time::Instant;
use synthesis::{SynthesisClient, SynthesisConfig};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Secweave v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the scan
    match run_scan(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .secweave.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".secweave.toml");

    if path.exists() {
        eprintln!("⚠️  .secweave.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .secweave.toml")?;

    println!("✅ Created .secweave.toml with default settings.");
    println!("   Edit it to customize the synthesis backend and scan behavior.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete scan workflow. Returns exit code (0 or 2).
async fn run_scan(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let target = args.scan_target();

    if let Some(ref repo) = target.repo_url {
        println!("📥 Repository target: {}", repo);
    }
    if let Some(ref deploy) = target.deploy_url {
        println!("🌐 Deployment target: {}", deploy);
    }

    if args.offline {
        println!("🧮 Synthesis: offline (deterministic engine)");
    } else {
        println!(
            "🤖 Synthesis: {} via {}",
            config.synthesis.model, config.synthesis.api_url
        );
        if args.api_key.is_none() {
            warn!("No synthesis API key set; the deterministic engine will produce the report");
        }
    }

    // Build collaborators from the merged configuration
    let synthesis_client = SynthesisClient::new(SynthesisConfig {
        api_url: config.synthesis.api_url.clone(),
        api_key: args.api_key.clone(),
        model: config.synthesis.model.clone(),
        temperature: config.synthesis.temperature,
        max_tokens: config.synthesis.max_tokens,
        timeout_seconds: config.synthesis.timeout_seconds,
    })?;

    let options = PipelineOptions {
        github_token: args.github_token.clone(),
        command_timeout_secs: config.pipeline.command_timeout_seconds,
        offline: args.offline,
        attach_snippets: config.report.include_snippets,
        snippet_context_lines: config.report.snippet_context_lines,
        show_progress: !args.quiet,
    };

    let scan_pipeline = ScanPipeline::new(options, synthesis_client);

    println!("\n🔬 Running security scan...\n");
    let outcome = scan_pipeline.run(&target).await?;

    // Render and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let context = RenderContext {
        target,
        generated_at: Utc::now(),
        duration_seconds: duration,
    };

    let output = match args.format {
        OutputFormat::Json => render_json(&outcome)?,
        OutputFormat::Markdown => render_markdown(&outcome, &context),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    // Optional raw per-tool payload dump
    if let Some(ref raw_path) = args.raw_output {
        let raw_json = serde_json::to_string_pretty(&outcome.raw)?;
        std::fs::write(raw_path, raw_json)
            .with_context(|| format!("Failed to write raw payloads to {}", raw_path.display()))?;
        println!("   Raw tool payloads saved to: {}", raw_path.display());
    }

    // Print summary
    let summary = &outcome.primary.summary;
    println!("\n📊 Scan Summary:");
    println!(
        "   Verdict: {} (posture: {})",
        summary.overall_production_readiness, summary.posture
    );
    println!("   Raw findings: {}", summary.total_raw_findings);
    println!(
        "   - 🔴 Fix now: {} | 🟡 Backlog: {} | Grouped issues: {}",
        summary.fix_now_count,
        summary.backlog_count,
        outcome.primary.issues.len()
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Scan complete! Report saved to: {}",
        args.output.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = fail_on_to_severity(fail_level);
        if has_issue_at_or_above(&outcome, threshold) {
            eprintln!(
                "\n⛔ Issues found at or above {:?} severity. Failing (exit code 2).",
                fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Whether the primary report contains an issue at or above the level.
fn has_issue_at_or_above(outcome: &ScanOutcome, threshold: Severity) -> bool {
    outcome
        .primary
        .issues
        .iter()
        .any(|issue| issue.severity >= threshold)
}

/// Convert FailOnLevel to Severity for comparison.
fn fail_on_to_severity(level: FailOnLevel) -> Severity {
    match level {
        FailOnLevel::Low => Severity::Low,
        FailOnLevel::Medium => Severity::Medium,
        FailOnLevel::High => Severity::High,
        FailOnLevel::Critical => Severity::Critical,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .secweave.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
