//! End-to-end scan orchestration.
//!
//! One scan runs the staged sequence clone → tech-stack check → static
//! analysis → dynamic analysis → evidence extraction → synthesis, with
//! the workspace removed no matter how far the run got. The governing
//! policy is degrade-don't-abort: a failed clone only disables the
//! static branch, a failed scanner contributes nothing, and a failed
//! synthesis falls back to the deterministic normalizer. Only an
//! unexpected error surfaces to the caller, and only after cleanup.

pub mod snippets;
pub mod techstack;
pub mod workspace;

use crate::exec::{CommandRunner, DEFAULT_COMMAND_TIMEOUT_SECS};
use crate::models::{
    NormalizedReport, RawReport, RawToolPayloads, ScanOutcome, ScanTarget, Severity,
};
use crate::report::{normalize, ReportBuilder};
use crate::scanner::{CodeQlScanner, SemgrepScanner, ZapScanner};
use crate::synthesis::{SynthesisClient, SynthesisError, SynthesisRequest};
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};
use workspace::Workspace;

/// Stage of the scan sequence, used as a log marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Init,
    Clone,
    StaticAnalysis,
    DynamicAnalysis,
    EvidenceExtraction,
    Synthesis,
    Done,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStage::Init => write!(f, "init"),
            ScanStage::Clone => write!(f, "clone"),
            ScanStage::StaticAnalysis => write!(f, "static-analysis"),
            ScanStage::DynamicAnalysis => write!(f, "dynamic-analysis"),
            ScanStage::EvidenceExtraction => write!(f, "evidence-extraction"),
            ScanStage::Synthesis => write!(f, "synthesis"),
            ScanStage::Done => write!(f, "done"),
        }
    }
}

/// Behavior knobs for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Token injected into GitHub clone URLs.
    pub github_token: Option<String>,
    /// Cap on each scanner subprocess, in seconds.
    pub command_timeout_secs: u64,
    /// Skip the synthesis backend and use the deterministic engine
    /// directly.
    pub offline: bool,
    /// Attach source-context windows to code findings.
    pub attach_snippets: bool,
    /// Lines of context on each side of a finding.
    pub snippet_context_lines: usize,
    /// Show a clone progress bar.
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            github_token: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            offline: false,
            attach_snippets: true,
            snippet_context_lines: 15,
            show_progress: false,
        }
    }
}

/// Orchestrates one scan request end to end.
pub struct ScanPipeline {
    options: PipelineOptions,
    synthesis: SynthesisClient,
}

impl ScanPipeline {
    pub fn new(options: PipelineOptions, synthesis: SynthesisClient) -> Self {
        Self { options, synthesis }
    }

    /// Run the full scan sequence for one target.
    ///
    /// The workspace is removed unconditionally, including when an
    /// unexpected error is about to propagate.
    pub async fn run(&self, target: &ScanTarget) -> Result<ScanOutcome> {
        target.validate().map_err(anyhow::Error::msg)?;

        info!("[{}] Starting security scan pipeline", ScanStage::Init);
        let workspace = Workspace::create()?;

        let result = self.execute(target, &workspace).await;
        workspace.cleanup();

        if let Err(ref e) = result {
            warn!("Scan pipeline failed: {}", e);
        }
        result
    }

    async fn execute(&self, target: &ScanTarget, workspace: &Workspace) -> Result<ScanOutcome> {
        let runner = CommandRunner::new(self.options.command_timeout_secs);
        let mut builder = ReportBuilder::new();

        // Clone branch. Failure is logged and only disables the static
        // branch: the checkout the static scanners need does not exist.
        let mut repo_root: Option<PathBuf> = None;
        if let Some(ref repo_url) = target.repo_url {
            info!("[{}] Cloning {}", ScanStage::Clone, repo_url);
            match workspace.clone_repo(
                repo_url,
                self.options.github_token.as_deref(),
                self.options.show_progress,
            ) {
                Ok(path) => repo_root = Some(path),
                Err(e) => {
                    warn!(
                        "[{}] Clone failed, skipping static analysis: {}",
                        ScanStage::Clone,
                        e
                    );
                }
            }
        }

        // Tech-stack check on the checkout. The flag only feeds the
        // synthesis prompt.
        let mut nosql_detected = false;
        if let Some(ref repo) = repo_root {
            nosql_detected = techstack::detect_nosql(repo);
            if nosql_detected {
                builder.add_custom_issue(
                    techstack::NOSQL_FINDING_TITLE,
                    techstack::NOSQL_FINDING_DESCRIPTION,
                    Severity::Info,
                );
            }
        }

        // The static and dynamic branches are independent; run them
        // concurrently, then ingest in fixed order so the report is
        // identical to a sequential run.
        let static_branch = async {
            let Some(ref repo) = repo_root else {
                return (None, Vec::new());
            };
            info!("[{}] Running Semgrep and CodeQL", ScanStage::StaticAnalysis);

            let semgrep = match SemgrepScanner::new(runner.clone()).scan(repo).await {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!("[{}] Semgrep failed: {}", ScanStage::StaticAnalysis, e);
                    None
                }
            };
            let codeql = match CodeQlScanner::new(runner.clone()).scan(repo).await {
                Ok(documents) => documents,
                Err(e) => {
                    warn!("[{}] CodeQL failed: {}", ScanStage::StaticAnalysis, e);
                    Vec::new()
                }
            };
            (semgrep, codeql)
        };

        let dynamic_branch = async {
            let Some(ref deploy_url) = target.deploy_url else {
                return None;
            };
            info!(
                "[{}] Running OWASP ZAP on {}",
                ScanStage::DynamicAnalysis,
                deploy_url
            );
            match ZapScanner::new(runner.clone()).scan(deploy_url).await {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!("[{}] ZAP failed: {}", ScanStage::DynamicAnalysis, e);
                    None
                }
            }
        };

        let ((semgrep_res, codeql_res), zap_res) = futures::join!(static_branch, dynamic_branch);

        if let Some(ref document) = semgrep_res {
            builder.add_semgrep_results(document);
        }
        for document in &codeql_res {
            builder.add_codeql_results(document);
        }
        if let Some(ref document) = zap_res {
            builder.add_zap_results(document);
        }

        let mut raw_report = builder.build_report();

        if self.options.attach_snippets {
            if let Some(ref repo) = repo_root {
                info!(
                    "[{}] Extracting code snippets for {} findings",
                    ScanStage::EvidenceExtraction,
                    raw_report.issues.len()
                );
                snippets::attach_snippets(
                    &mut raw_report.issues,
                    repo,
                    self.options.snippet_context_lines,
                );
            }
        }

        let primary = self.synthesize(&raw_report, nosql_detected).await;

        info!("[{}] Scan complete", ScanStage::Done);
        Ok(ScanOutcome {
            primary,
            raw: RawToolPayloads {
                semgrep: semgrep_res,
                codeql: codeql_res,
                zap: zap_res,
            },
        })
    }

    /// Ask the backend for the primary report, falling back to the
    /// deterministic engine on any failure. Never errors.
    async fn synthesize(&self, raw_report: &RawReport, nosql_detected: bool) -> NormalizedReport {
        if self.options.offline {
            info!(
                "[{}] Offline mode, using deterministic normalization",
                ScanStage::Synthesis
            );
            return normalize(&raw_report.issues);
        }

        info!("[{}] Requesting AI report synthesis", ScanStage::Synthesis);
        let request = SynthesisRequest::from_raw_report(raw_report);
        choose_primary(
            self.synthesis.synthesize(&request, nosql_detected).await,
            raw_report,
        )
    }
}

/// Pick the synthesized report, or the deterministic fallback on any
/// explicit failure.
fn choose_primary(
    synthesized: Result<NormalizedReport, SynthesisError>,
    raw_report: &RawReport,
) -> NormalizedReport {
    match synthesized {
        Ok(report) => report,
        Err(e) => {
            warn!(
                "[{}] Synthesis failed ({}), falling back to deterministic normalization",
                ScanStage::Synthesis,
                e
            );
            normalize(&raw_report.issues)
        }
    }
}
