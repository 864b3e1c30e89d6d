//! Conversion of raw tool output into canonical issues.
//!
//! The builder accepts each tool's native JSON document, converts every
//! finding it can make sense of into an [`Issue`], and accumulates the
//! coverage flags. Parsing is deliberately lenient: unknown fields are
//! ignored and a malformed finding is skipped with a warning instead of
//! sinking the whole report.

use crate::models::{Issue, IssueSource, IssueType, RawReport, ScanSummary, ScanTool, Severity};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

// ---------------------------------------------------------------------
// Semgrep document shape
// ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepFinding {
    check_id: Option<String>,
    path: Option<String>,
    start: Option<SemgrepPosition>,
    extra: Option<SemgrepExtra>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepPosition {
    line: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepExtra {
    severity: Option<String>,
    message: Option<String>,
}

// ---------------------------------------------------------------------
// SARIF document shape (CodeQL)
// ---------------------------------------------------------------------

/// Accepted shapes for SARIF input.
///
/// `codeql database analyze` emits a single document, but aggregated
/// payloads may carry several documents or a bare list of runs. The
/// shape is resolved up front instead of sniffing fields downstream.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SarifInput {
    Document(SarifDocument),
    Documents(Vec<SarifDocument>),
    Runs(Vec<SarifRun>),
}

impl SarifInput {
    /// Flatten whichever shape was provided into a list of runs.
    pub fn into_runs(self) -> Vec<SarifRun> {
        match self {
            SarifInput::Document(document) => document.runs,
            SarifInput::Documents(documents) => {
                documents.into_iter().flat_map(|d| d.runs).collect()
            }
            SarifInput::Runs(runs) => runs,
        }
    }
}

/// A full SARIF document. `runs` is required so that a bare run object
/// never masquerades as a document.
#[derive(Debug, Deserialize)]
pub struct SarifDocument {
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SarifRun {
    tool: SarifTool,
    results: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SarifDriver {
    rules: Vec<SarifRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SarifRule {
    id: String,
    short_description: Option<SarifText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SarifText {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SarifResult {
    rule_id: Option<String>,
    level: Option<String>,
    message: SarifText,
    locations: Vec<SarifLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SarifLocation {
    physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SarifPhysicalLocation {
    artifact_location: SarifArtifactLocation,
    region: SarifRegion,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SarifArtifactLocation {
    uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SarifRegion {
    start_line: u64,
}

// ---------------------------------------------------------------------
// ZAP document shape
// ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZapReport {
    site: Vec<ZapSite>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZapSite {
    alerts: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZapAlert {
    alert: Option<String>,
    riskcode: Option<String>,
    description: Option<String>,
    method: Option<String>,
    url: Option<String>,
    evidence: Option<String>,
    other: Option<String>,
}

// ---------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------

/// Aggregates raw findings from the scanner suite into a single report.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    issues: Vec<Issue>,
    repo_scanned: bool,
    deploy_scanned: bool,
    tools_used: BTreeSet<ScanTool>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom or configuration-detected issue.
    pub fn add_custom_issue(&mut self, title: &str, description: &str, severity: Severity) {
        self.tools_used.insert(ScanTool::ConfigCheck);
        self.repo_scanned = true;

        self.issues.push(Issue {
            source: IssueSource::Code,
            tool: ScanTool::ConfigCheck,
            issue_type: if severity == Severity::Info {
                IssueType::LogicBug
            } else {
                IssueType::SecurityVulnerability
            },
            severity,
            title: title.to_string(),
            description: description.to_string(),
            location: "Configuration/Dependencies".to_string(),
            code_snippet: None,
        });
    }

    /// Ingest a Semgrep JSON document (or a bare findings list).
    pub fn add_semgrep_results(&mut self, raw: &Value) {
        self.tools_used.insert(ScanTool::Semgrep);
        self.repo_scanned = true;

        let results: Vec<Value> = if let Some(object) = raw.as_object() {
            object
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        } else if let Some(list) = raw.as_array() {
            list.clone()
        } else {
            warn!("Unexpected Semgrep output shape, ignoring payload");
            return;
        };

        for item in results {
            let finding: SemgrepFinding = match serde_json::from_value(item) {
                Ok(finding) => finding,
                Err(e) => {
                    warn!("Skipping malformed Semgrep finding: {}", e);
                    continue;
                }
            };

            let check_id = finding.check_id.as_deref().unwrap_or("");
            let raw_severity = finding
                .extra
                .as_ref()
                .and_then(|e| e.severity.as_deref())
                .unwrap_or("WARNING");

            // Semgrep severity is typically ERROR, WARNING, INFO.
            let severity = match raw_severity {
                "ERROR" => Severity::High,
                "INFO" => Severity::Low,
                _ => Severity::Medium,
            };

            self.issues.push(Issue {
                source: IssueSource::Code,
                tool: ScanTool::Semgrep,
                issue_type: if check_id.contains("correctness") {
                    IssueType::LogicBug
                } else {
                    IssueType::SecurityVulnerability
                },
                severity,
                title: finding
                    .check_id
                    .unwrap_or_else(|| "Unknown Issue".to_string()),
                description: finding
                    .extra
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "No description".to_string()),
                location: format!(
                    "{}:{}",
                    finding.path.unwrap_or_default(),
                    finding.start.unwrap_or_default().line
                ),
                code_snippet: None,
            });
        }
    }

    /// Ingest a CodeQL SARIF payload in any of the accepted shapes.
    pub fn add_codeql_results(&mut self, raw: &Value) {
        self.tools_used.insert(ScanTool::CodeQl);
        self.repo_scanned = true;

        let input: SarifInput = match serde_json::from_value(raw.clone()) {
            Ok(input) => input,
            Err(e) => {
                warn!("Unexpected CodeQL output shape, ignoring payload: {}", e);
                return;
            }
        };

        for run in input.into_runs() {
            let rules: HashMap<&str, &SarifRule> = run
                .tool
                .driver
                .rules
                .iter()
                .map(|rule| (rule.id.as_str(), rule))
                .collect();

            for item in &run.results {
                let result: SarifResult = match serde_json::from_value(item.clone()) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Skipping malformed CodeQL result: {}", e);
                        continue;
                    }
                };

                let rule_id = result.rule_id.as_deref().unwrap_or("");
                let rule = rules.get(rule_id);

                // SARIF levels are error, warning, note.
                let severity = match result.level.as_deref().unwrap_or("warning") {
                    "error" => Severity::High,
                    "note" => Severity::Low,
                    _ => Severity::Medium,
                };

                let location = match result.locations.first() {
                    Some(first) => format!(
                        "{}:{}",
                        first.physical_location.artifact_location.uri,
                        first.physical_location.region.start_line
                    ),
                    None => "Unknown".to_string(),
                };

                let description = result
                    .message
                    .text
                    .or_else(|| {
                        rule.and_then(|r| r.short_description.as_ref())
                            .and_then(|d| d.text.clone())
                    })
                    .unwrap_or_default();

                self.issues.push(Issue {
                    source: IssueSource::Code,
                    tool: ScanTool::CodeQl,
                    issue_type: IssueType::SecurityVulnerability,
                    severity,
                    title: result
                        .rule_id
                        .unwrap_or_else(|| "Unknown Issue".to_string()),
                    description,
                    location,
                    code_snippet: None,
                });
            }
        }
    }

    /// Ingest an OWASP ZAP JSON report.
    pub fn add_zap_results(&mut self, raw: &Value) {
        self.tools_used.insert(ScanTool::OwaspZap);
        self.deploy_scanned = true;

        let report: ZapReport = match serde_json::from_value(raw.clone()) {
            Ok(report) => report,
            Err(e) => {
                warn!("Unexpected ZAP output shape, ignoring payload: {}", e);
                return;
            }
        };

        for site in report.site {
            for item in site.alerts {
                let alert: ZapAlert = match serde_json::from_value(item) {
                    Ok(alert) => alert,
                    Err(e) => {
                        warn!("Skipping malformed ZAP alert: {}", e);
                        continue;
                    }
                };

                // ZAP risk codes: 0=Info, 1=Low, 2=Medium, 3=High.
                let severity = match alert.riskcode.as_deref().unwrap_or("1") {
                    "3" => Severity::High,
                    "2" => Severity::Medium,
                    "0" => Severity::Info,
                    _ => Severity::Low,
                };

                let evidence = alert.evidence.unwrap_or_default();
                let other = alert.other.unwrap_or_default();
                let snippet = if !evidence.is_empty() || !other.is_empty() {
                    Some(format!("Evidence: {}\nOther: {}", evidence, other))
                } else {
                    None
                };

                self.issues.push(Issue {
                    source: IssueSource::Runtime,
                    tool: ScanTool::OwaspZap,
                    issue_type: IssueType::RuntimeIssue,
                    severity,
                    title: alert.alert.unwrap_or_else(|| "Unknown Alert".to_string()),
                    description: alert.description.unwrap_or_default(),
                    location: format!(
                        "{} {}",
                        alert.method.as_deref().unwrap_or("GET"),
                        alert.url.unwrap_or_default()
                    ),
                    code_snippet: snippet,
                });
            }
        }
    }

    /// Ingest the URL list discovered by the Gospider crawl.
    pub fn add_gospider_results(&mut self, urls: &[String]) {
        self.tools_used.insert(ScanTool::Gospider);
        self.deploy_scanned = true;

        if urls.is_empty() {
            return;
        }

        let count = urls.len();
        let preview = urls
            .iter()
            .take(20)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let mut snippet = format!("Gospider discovered {} URLs. First 20:\n{}", count, preview);
        if count > 20 {
            snippet.push_str(&format!("\n...and {} more.", count - 20));
        }

        self.issues.push(Issue {
            source: IssueSource::Runtime,
            tool: ScanTool::Gospider,
            issue_type: IssueType::RuntimeIssue,
            severity: Severity::Info,
            title: "Sitemap Discovery".to_string(),
            description:
                "The spider successfully crawled the target and discovered accessible endpoints."
                    .to_string(),
            location: "Target Scope".to_string(),
            code_snippet: Some(snippet),
        });
    }

    /// Finalize the aggregate report.
    pub fn build_report(self) -> RawReport {
        RawReport {
            summary: ScanSummary {
                repo_scanned: self.repo_scanned,
                deploy_scanned: self.deploy_scanned,
                tools_used: self.tools_used.iter().copied().collect(),
                total_issues: self.issues.len(),
            },
            issues: self.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SEMGREP_FIXTURE: &str = include_str!("../../fixtures/semgrep_results.json");
    const CODEQL_FIXTURE: &str = include_str!("../../fixtures/codeql_report.sarif");
    const ZAP_FIXTURE: &str = include_str!("../../fixtures/zap_report.json");

    #[test]
    fn test_semgrep_document_ingestion() {
        let raw: Value = serde_json::from_str(SEMGREP_FIXTURE).unwrap();
        let mut builder = ReportBuilder::new();
        builder.add_semgrep_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 3);
        assert!(report.summary.repo_scanned);
        assert!(!report.summary.deploy_scanned);
        assert_eq!(report.summary.tools_used, vec![ScanTool::Semgrep]);

        let sqli = &report.issues[0];
        assert_eq!(sqli.tool, ScanTool::Semgrep);
        assert_eq!(sqli.severity, Severity::High);
        assert_eq!(sqli.issue_type, IssueType::SecurityVulnerability);
        assert_eq!(sqli.location, "src/routes/users.js:42");

        // A check id containing "correctness" is a logic bug.
        let logic = &report.issues[2];
        assert_eq!(logic.issue_type, IssueType::LogicBug);
        assert_eq!(logic.severity, Severity::Low);
    }

    #[test]
    fn test_semgrep_bare_list_ingestion() {
        let raw = json!([
            {"check_id": "x.y.sqli", "path": "a.py", "start": {"line": 7}, "extra": {"severity": "ERROR", "message": "tainted"}}
        ]);
        let mut builder = ReportBuilder::new();
        builder.add_semgrep_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].location, "a.py:7");
    }

    #[test]
    fn test_semgrep_skips_malformed_entries() {
        let raw = json!({"results": ["not-a-finding", {"check_id": "ok.rule"}]});
        let mut builder = ReportBuilder::new();
        builder.add_semgrep_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].title, "ok.rule");
        // Missing severity falls back to WARNING -> Medium.
        assert_eq!(report.issues[0].severity, Severity::Medium);
        assert_eq!(report.issues[0].description, "No description");
    }

    #[test]
    fn test_semgrep_scalar_payload_still_marks_tool() {
        let mut builder = ReportBuilder::new();
        builder.add_semgrep_results(&json!(42));
        let report = builder.build_report();

        assert!(report.issues.is_empty());
        assert_eq!(report.summary.tools_used, vec![ScanTool::Semgrep]);
        assert!(report.summary.repo_scanned);
    }

    #[test]
    fn test_codeql_sarif_document() {
        let raw: Value = serde_json::from_str(CODEQL_FIXTURE).unwrap();
        let mut builder = ReportBuilder::new();
        builder.add_codeql_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 2);

        let first = &report.issues[0];
        assert_eq!(first.tool, ScanTool::CodeQl);
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.title, "js/sql-injection");
        assert_eq!(first.location, "src/routes/search.js:118");
        assert_eq!(first.description, "Query built from user input.");

        // Description falls back to the rule's short description.
        let second = &report.issues[1];
        assert_eq!(second.severity, Severity::Low);
        assert_eq!(second.description, "Unused variable or import.");
    }

    #[test]
    fn test_codeql_accepts_document_list() {
        let document: Value = serde_json::from_str(CODEQL_FIXTURE).unwrap();
        let raw = json!([document.clone(), document]);

        let mut builder = ReportBuilder::new();
        builder.add_codeql_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 4);
    }

    #[test]
    fn test_codeql_accepts_bare_runs() {
        let document: Value = serde_json::from_str(CODEQL_FIXTURE).unwrap();
        let runs = document.get("runs").unwrap().clone();

        let mut builder = ReportBuilder::new();
        builder.add_codeql_results(&runs);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn test_codeql_missing_location_is_unknown() {
        let raw = json!({"runs": [{"tool": {"driver": {"rules": []}}, "results": [
            {"ruleId": "js/thing", "level": "warning", "message": {"text": "m"}}
        ]}]});

        let mut builder = ReportBuilder::new();
        builder.add_codeql_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues[0].location, "Unknown");
        assert_eq!(report.issues[0].severity, Severity::Medium);
    }

    #[test]
    fn test_zap_ingestion() {
        let raw: Value = serde_json::from_str(ZAP_FIXTURE).unwrap();
        let mut builder = ReportBuilder::new();
        builder.add_zap_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 3);
        assert!(report.summary.deploy_scanned);
        assert!(!report.summary.repo_scanned);

        let xss = &report.issues[0];
        assert_eq!(xss.source, IssueSource::Runtime);
        assert_eq!(xss.severity, Severity::High);
        assert_eq!(xss.location, "POST https://shop.example.com/search");
        let snippet = xss.code_snippet.as_deref().unwrap();
        assert!(snippet.starts_with("Evidence: "));
        assert!(snippet.contains("<script>"));

        // No evidence and no other detail means no snippet at all.
        let header = &report.issues[1];
        assert_eq!(header.severity, Severity::Low);
        assert!(header.code_snippet.is_none());

        let info = &report.issues[2];
        assert_eq!(info.severity, Severity::Info);
        assert_eq!(info.title, "Unknown Alert");
        assert!(info.location.starts_with("GET "));
    }

    #[test]
    fn test_zap_unknown_risk_code_maps_low() {
        let raw = json!({"site": [{"alerts": [{"alert": "Odd", "riskcode": "9"}]}]});
        let mut builder = ReportBuilder::new();
        builder.add_zap_results(&raw);
        let report = builder.build_report();

        assert_eq!(report.issues[0].severity, Severity::Low);
    }

    #[test]
    fn test_custom_issue_classification() {
        let mut builder = ReportBuilder::new();
        builder.add_custom_issue("Technology Detected: MongoDB", "NoSQL in use", Severity::Info);
        builder.add_custom_issue("Hardcoded secret", "Key in repo", Severity::High);
        let report = builder.build_report();

        assert_eq!(report.issues[0].issue_type, IssueType::LogicBug);
        assert_eq!(report.issues[0].location, "Configuration/Dependencies");
        assert_eq!(report.issues[1].issue_type, IssueType::SecurityVulnerability);
        assert_eq!(report.summary.tools_used, vec![ScanTool::ConfigCheck]);
    }

    #[test]
    fn test_gospider_summarizes_urls() {
        let urls: Vec<String> = (0..25).map(|i| format!("https://t.example/{}", i)).collect();
        let mut builder = ReportBuilder::new();
        builder.add_gospider_results(&urls);
        let report = builder.build_report();

        assert_eq!(report.issues.len(), 1);
        let snippet = report.issues[0].code_snippet.as_deref().unwrap();
        assert!(snippet.contains("discovered 25 URLs"));
        assert!(snippet.contains("...and 5 more."));
        assert_eq!(report.issues[0].title, "Sitemap Discovery");
    }

    #[test]
    fn test_gospider_empty_still_marks_coverage() {
        let mut builder = ReportBuilder::new();
        builder.add_gospider_results(&[]);
        let report = builder.build_report();

        assert!(report.issues.is_empty());
        assert!(report.summary.deploy_scanned);
        assert_eq!(report.summary.tools_used, vec![ScanTool::Gospider]);
    }

    #[test]
    fn test_tools_used_order_is_deterministic() {
        let mut builder = ReportBuilder::new();
        // Ingestion order deliberately scrambled.
        builder.add_zap_results(&json!({"site": []}));
        builder.add_custom_issue("t", "d", Severity::Info);
        builder.add_semgrep_results(&json!({"results": []}));
        let report = builder.build_report();

        assert_eq!(
            report.summary.tools_used,
            vec![ScanTool::Semgrep, ScanTool::OwaspZap, ScanTool::ConfigCheck]
        );
    }

    #[test]
    fn test_total_issues_counts_all_tools() {
        let raw_semgrep: Value = serde_json::from_str(SEMGREP_FIXTURE).unwrap();
        let raw_zap: Value = serde_json::from_str(ZAP_FIXTURE).unwrap();

        let mut builder = ReportBuilder::new();
        builder.add_semgrep_results(&raw_semgrep);
        builder.add_zap_results(&raw_zap);
        let report = builder.build_report();

        assert_eq!(report.summary.total_issues, 6);
        assert_eq!(report.issues.len(), 6);
    }
}
