//! Data models for the scan pipeline.
//!
//! This module contains the canonical types shared across the pipeline:
//! the raw `Issue` records produced by the report builder, the normalized
//! report shape produced by classification (and expected back from the
//! synthesis backend), and the terminal `{primary, raw}` outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity level of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational - discovery items, tech-stack notes
    #[serde(alias = "INFO")]
    Info,
    /// Low severity - hardening gaps, missing headers
    #[serde(alias = "LOW")]
    Low,
    /// Medium severity - reachable weaknesses without direct proof
    #[serde(alias = "MEDIUM")]
    Medium,
    /// High severity - injection, auth bypass, confirmed weaknesses
    #[serde(alias = "HIGH")]
    High,
    /// Critical severity - reserved for compound or confirmed compromise
    #[serde(alias = "CRITICAL")]
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => "⚪",
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }
}

/// The scanner that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScanTool {
    Semgrep,
    #[serde(rename = "CodeQL")]
    CodeQl,
    #[serde(rename = "OWASP ZAP")]
    OwaspZap,
    Gospider,
    #[serde(rename = "Config Check")]
    ConfigCheck,
}

impl fmt::Display for ScanTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTool::Semgrep => write!(f, "Semgrep"),
            ScanTool::CodeQl => write!(f, "CodeQL"),
            ScanTool::OwaspZap => write!(f, "OWASP ZAP"),
            ScanTool::Gospider => write!(f, "Gospider"),
            ScanTool::ConfigCheck => write!(f, "Config Check"),
        }
    }
}

/// Coarse classification of a raw finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "Logic Bug")]
    LogicBug,
    #[serde(rename = "Security Vulnerability")]
    SecurityVulnerability,
    #[serde(rename = "Runtime Issue")]
    RuntimeIssue,
}

/// Where a finding was observed: in source code or against the live deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Code,
    Runtime,
}

/// A single canonical finding, converted from one raw tool result.
///
/// Created by the report builder; `code_snippet` is filled in later by the
/// evidence extractor for code findings with a resolvable location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Origin of the finding (code vs. runtime).
    pub source: IssueSource,
    /// Tool that produced the finding.
    pub tool: ScanTool,
    /// Coarse issue classification.
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Severity after per-tool mapping.
    pub severity: Severity,
    /// Short title (rule id or alert name); also the grouping key downstream.
    pub title: String,
    /// Tool-provided description.
    pub description: String,
    /// `path:line` for code findings, `"METHOD url"` for runtime findings,
    /// or free text.
    pub location: String,
    /// Evidence window or tool-captured proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

/// Coverage summary for one raw aggregate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Whether any repository-side scan contributed.
    pub repo_scanned: bool,
    /// Whether any deployment-side scan contributed.
    pub deploy_scanned: bool,
    /// Every tool whose ingestion ran, even when it yielded no issues.
    pub tools_used: Vec<ScanTool>,
    /// Count of raw issues across all tools.
    pub total_issues: usize,
}

/// Raw aggregate report: canonical issues plus coverage flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    pub summary: ScanSummary,
    pub issues: Vec<Issue>,
}

/// What to scan. At least one of the two targets must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Git URL of the repository to clone and statically analyze.
    pub repo_url: Option<String>,
    /// Base URL of the running deployment to scan dynamically.
    pub deploy_url: Option<String>,
}

impl ScanTarget {
    /// Validate the precondition that at least one target is set.
    pub fn validate(&self) -> Result<(), String> {
        if self.repo_url.is_none() && self.deploy_url.is_none() {
            return Err("At least one of repo_url or deploy_url is required.".to_string());
        }
        Ok(())
    }
}

/// One concrete occurrence of a normalized issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInstance {
    pub path: String,
    /// 1-based line number, 0 when unknown.
    pub line: u32,
    #[serde(default)]
    pub code_snippet: String,
}

/// Which layer of the system owns the remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Backend,
    Frontend,
    Infra,
    Unknown,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Backend => write!(f, "backend"),
            Ownership::Frontend => write!(f, "frontend"),
            Ownership::Infra => write!(f, "infra"),
            Ownership::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classification of a normalized issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedIssueType {
    Security,
    Logic,
    Reliability,
    Configuration,
}

/// Confidence tier describing how a finding was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    StaticDetected,
    RuntimeConfirmed,
    Insufficient,
}

impl fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceLevel::StaticDetected => write!(f, "static_detected"),
            EvidenceLevel::RuntimeConfirmed => write!(f, "runtime_confirmed"),
            EvidenceLevel::Insufficient => write!(f, "insufficient"),
        }
    }
}

/// Assessed real-world risk of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exploitability {
    Exploitable,
    Theoretical,
    NonExploitable,
    Unknown,
}

/// Remediation routing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    FixNow,
    Backlog,
    Ignore,
    Review,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::FixNow => write!(f, "fix_now"),
            Decision::Backlog => write!(f, "backlog"),
            Decision::Ignore => write!(f, "ignore"),
            Decision::Review => write!(f, "review"),
        }
    }
}

/// Aggregate qualitative health label for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Good,
    Moderate,
    Weak,
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Posture::Good => write!(f, "good"),
            Posture::Moderate => write!(f, "moderate"),
            Posture::Weak => write!(f, "weak"),
        }
    }
}

/// A deduplicated, classified finding: all raw issues sharing one title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedIssue {
    pub title: String,
    pub original_rule: String,
    pub ownership: Ownership,
    pub issue_type: NormalizedIssueType,
    pub severity: Severity,
    pub evidence_level: EvidenceLevel,
    pub exploitability: Exploitability,
    pub decision: Decision,
    pub reason: String,
    pub recommended_action: String,
    /// Never empty: one entry per raw issue in the group.
    pub instances: Vec<IssueInstance>,
    pub source: IssueSource,
}

/// Roll-up statistics over a normalized report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSummary {
    pub overall_production_readiness: String,
    pub total_raw_findings: usize,
    pub fix_now_count: usize,
    pub backlog_count: usize,
    pub posture: Posture,
}

/// The classified report: either synthesized by the AI backend or produced
/// by the deterministic normalization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedReport {
    pub summary: NormalizedSummary,
    pub issues: Vec<NormalizedIssue>,
}

/// Raw per-tool payloads retained alongside the primary report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawToolPayloads {
    pub semgrep: Option<Value>,
    #[serde(default)]
    pub codeql: Vec<Value>,
    pub zap: Option<Value>,
}

/// Terminal result of one scan: the primary report plus the raw payloads
/// it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub primary: NormalizedReport,
    pub raw: RawToolPayloads,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_wire_spelling() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"High\"");
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"Info\"");
        // Uppercase spellings from the synthesis backend still parse.
        assert_eq!(
            serde_json::from_str::<Severity>("\"HIGH\"").unwrap(),
            Severity::High
        );
    }

    #[test]
    fn test_tool_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&ScanTool::OwaspZap).unwrap(),
            "\"OWASP ZAP\""
        );
        assert_eq!(
            serde_json::to_string(&ScanTool::ConfigCheck).unwrap(),
            "\"Config Check\""
        );
        assert_eq!(
            serde_json::from_str::<ScanTool>("\"CodeQL\"").unwrap(),
            ScanTool::CodeQl
        );
    }

    #[test]
    fn test_issue_type_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&IssueType::SecurityVulnerability).unwrap(),
            "\"Security Vulnerability\""
        );
        assert_eq!(
            serde_json::to_string(&IssueType::LogicBug).unwrap(),
            "\"Logic Bug\""
        );
    }

    #[test]
    fn test_decision_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&Decision::FixNow).unwrap(),
            "\"fix_now\""
        );
        assert_eq!(
            serde_json::to_string(&EvidenceLevel::RuntimeConfirmed).unwrap(),
            "\"runtime_confirmed\""
        );
        assert_eq!(
            serde_json::to_string(&Exploitability::NonExploitable).unwrap(),
            "\"non_exploitable\""
        );
    }

    #[test]
    fn test_scan_target_validation() {
        let empty = ScanTarget::default();
        assert!(empty.validate().is_err());

        let repo_only = ScanTarget {
            repo_url: Some("https://github.com/acme/shop.git".to_string()),
            deploy_url: None,
        };
        assert!(repo_only.validate().is_ok());

        let deploy_only = ScanTarget {
            repo_url: None,
            deploy_url: Some("https://shop.example.com".to_string()),
        };
        assert!(deploy_only.validate().is_ok());
    }

    #[test]
    fn test_issue_snippet_omitted_when_absent() {
        let issue = Issue {
            source: IssueSource::Code,
            tool: ScanTool::Semgrep,
            issue_type: IssueType::SecurityVulnerability,
            severity: Severity::High,
            title: "sql-injection".to_string(),
            description: "tainted query".to_string(),
            location: "src/db.py:10".to_string(),
            code_snippet: None,
        };

        let json = serde_json::to_string(&issue).unwrap();
        assert!(!json.contains("code_snippet"));
        assert!(json.contains("\"type\":\"Security Vulnerability\""));
    }

    #[test]
    fn test_normalized_report_round_trip() {
        let report = NormalizedReport {
            summary: NormalizedSummary {
                overall_production_readiness: "Production Ready".to_string(),
                total_raw_findings: 0,
                fix_now_count: 0,
                backlog_count: 0,
                posture: Posture::Good,
            },
            issues: vec![],
        };

        let json = serde_json::to_string(&report).unwrap();
        let back: NormalizedReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.posture, Posture::Good);
        assert!(back.issues.is_empty());
    }
}
