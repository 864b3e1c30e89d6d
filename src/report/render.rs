//! Markdown and JSON rendering of the final scan outcome.
//!
//! The persistence layer consumes the `{primary, raw}` blob as opaque
//! JSON; these renderers exist for the CLI so a human gets a readable
//! report file without another tool.

use crate::models::{NormalizedIssue, NormalizedSummary, ScanOutcome, ScanTarget};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Context printed in the report header.
pub struct RenderContext {
    pub target: ScanTarget,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Generate a complete Markdown report.
pub fn render_markdown(outcome: &ScanOutcome, context: &RenderContext) -> String {
    let mut output = String::new();

    output.push_str("# Secweave Security Report\n\n");
    output.push_str(&render_metadata_section(context, &outcome.primary.summary));
    output.push_str(&render_summary_section(&outcome.primary.summary));
    output.push_str(&render_issues_section(&outcome.primary.issues));
    output.push_str(&render_footer());

    output
}

/// Serialize the full `{primary, raw}` outcome as pretty JSON.
pub fn render_json(outcome: &ScanOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

fn render_metadata_section(context: &RenderContext, summary: &NormalizedSummary) -> String {
    let mut section = String::new();

    section.push_str("## Scan Details\n\n");
    if let Some(ref repo) = context.target.repo_url {
        section.push_str(&format!("- **Repository:** {}\n", repo));
    }
    if let Some(ref deploy) = context.target.deploy_url {
        section.push_str(&format!("- **Deployment:** {}\n", deploy));
    }
    section.push_str(&format!(
        "- **Scan Date:** {}\n",
        context.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Raw Findings:** {}\n",
        summary.total_raw_findings
    ));
    section.push_str(&format!(
        "- **Scan Duration:** {:.1}s\n",
        context.duration_seconds
    ));
    section.push('\n');

    section
}

fn render_summary_section(summary: &NormalizedSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "**{}** — security posture is **{}**.\n\n",
        summary.overall_production_readiness, summary.posture
    ));
    section.push_str("| Metric | Count |\n");
    section.push_str("|--------|-------|\n");
    section.push_str(&format!("| Raw findings | {} |\n", summary.total_raw_findings));
    section.push_str(&format!("| Fix now | {} |\n", summary.fix_now_count));
    section.push_str(&format!("| Backlog | {} |\n", summary.backlog_count));
    section.push('\n');

    section
}

fn render_issues_section(issues: &[NormalizedIssue]) -> String {
    let mut section = String::new();

    section.push_str("## Issues\n\n");

    if issues.is_empty() {
        section.push_str("No issues were reported. 🎉\n\n");
        return section;
    }

    for issue in issues {
        section.push_str(&render_issue(issue));
    }

    section
}

fn render_issue(issue: &NormalizedIssue) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} {}\n\n",
        issue.severity.emoji(),
        issue.title
    ));
    block.push_str(&format!(
        "**Severity:** {} | **Decision:** {} | **Evidence:** {} | **Owner:** {}\n\n",
        issue.severity, issue.decision, issue.evidence_level, issue.ownership
    ));
    block.push_str(&format!("{}\n\n", issue.reason));
    block.push_str(&format!(
        "**Recommended action:** {}\n\n",
        issue.recommended_action
    ));

    block.push_str(&format!("**Instances ({}):**\n\n", issue.instances.len()));
    for instance in &issue.instances {
        if instance.line > 0 {
            block.push_str(&format!("- `{}:{}`\n", instance.path, instance.line));
        } else {
            block.push_str(&format!("- `{}`\n", instance.path));
        }
    }
    block.push('\n');

    for instance in &issue.instances {
        if instance.code_snippet.is_empty() {
            continue;
        }
        block.push_str("<details>\n");
        block.push_str(&format!("<summary>Evidence: {}</summary>\n\n", instance.path));
        block.push_str("```\n");
        block.push_str(&instance.code_snippet);
        if !instance.code_snippet.ends_with('\n') {
            block.push('\n');
        }
        block.push_str("```\n\n");
        block.push_str("</details>\n\n");
    }

    block.push_str("---\n\n");

    block
}

fn render_footer() -> String {
    format!(
        "*Generated by Secweave v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Decision, EvidenceLevel, Exploitability, IssueInstance, IssueSource, NormalizedIssueType,
        NormalizedReport, Ownership, Posture, RawToolPayloads, Severity,
    };

    fn sample_outcome() -> ScanOutcome {
        ScanOutcome {
            primary: NormalizedReport {
                summary: NormalizedSummary {
                    overall_production_readiness: "Needs Remediation".to_string(),
                    total_raw_findings: 2,
                    fix_now_count: 1,
                    backlog_count: 0,
                    posture: Posture::Moderate,
                },
                issues: vec![NormalizedIssue {
                    title: "SQL Injection".to_string(),
                    original_rule: "SQL Injection".to_string(),
                    ownership: Ownership::Backend,
                    issue_type: NormalizedIssueType::Security,
                    severity: Severity::High,
                    evidence_level: EvidenceLevel::RuntimeConfirmed,
                    exploitability: Exploitability::Exploitable,
                    decision: Decision::FixNow,
                    reason: "Detected injection via OWASP ZAP. Evidence: runtime_confirmed."
                        .to_string(),
                    recommended_action: "Verify injection in backend layer and apply sanitization or configuration fix.".to_string(),
                    instances: vec![
                        IssueInstance {
                            path: "src/routes/users.js".to_string(),
                            line: 42,
                            code_snippet: " 42 | db.query(sql)".to_string(),
                        },
                        IssueInstance {
                            path: "GET https://shop.example.com/search".to_string(),
                            line: 0,
                            code_snippet: String::new(),
                        },
                    ],
                    source: IssueSource::Runtime,
                }],
            },
            raw: RawToolPayloads::default(),
        }
    }

    fn sample_context() -> RenderContext {
        RenderContext {
            target: ScanTarget {
                repo_url: Some("https://github.com/acme/shop.git".to_string()),
                deploy_url: Some("https://shop.example.com".to_string()),
            },
            generated_at: Utc::now(),
            duration_seconds: 12.5,
        }
    }

    #[test]
    fn test_markdown_contains_summary_and_issue() {
        let markdown = render_markdown(&sample_outcome(), &sample_context());

        assert!(markdown.contains("# Secweave Security Report"));
        assert!(markdown.contains("**Needs Remediation** — security posture is **moderate**."));
        assert!(markdown.contains("| Fix now | 1 |"));
        assert!(markdown.contains("### 🟠 SQL Injection"));
        assert!(markdown.contains("**Decision:** fix_now"));
        assert!(markdown.contains("- `src/routes/users.js:42`"));
        // Instance without a line renders without the trailing colon.
        assert!(markdown.contains("- `GET https://shop.example.com/search`\n"));
    }

    #[test]
    fn test_markdown_snippets_are_collapsed() {
        let markdown = render_markdown(&sample_outcome(), &sample_context());

        assert!(markdown.contains("<details>"));
        assert!(markdown.contains("db.query(sql)"));
        // The empty snippet of the second instance renders no block.
        assert_eq!(markdown.matches("<details>").count(), 1);
    }

    #[test]
    fn test_markdown_empty_report() {
        let outcome = ScanOutcome {
            primary: NormalizedReport {
                summary: NormalizedSummary {
                    overall_production_readiness: "Production Ready".to_string(),
                    total_raw_findings: 0,
                    fix_now_count: 0,
                    backlog_count: 0,
                    posture: Posture::Good,
                },
                issues: vec![],
            },
            raw: RawToolPayloads::default(),
        };

        let markdown = render_markdown(&outcome, &sample_context());
        assert!(markdown.contains("No issues were reported."));
    }

    #[test]
    fn test_json_round_trips() {
        let json = render_json(&sample_outcome()).unwrap();
        let back: ScanOutcome = serde_json::from_str(&json).unwrap();

        assert_eq!(back.primary.summary.fix_now_count, 1);
        assert_eq!(back.primary.issues.len(), 1);
    }
}
