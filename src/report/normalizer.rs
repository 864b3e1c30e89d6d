//! Deterministic grouping and classification of raw issues.
//!
//! This is the fallback behind the AI synthesis backend and the reference
//! for what a classified report must look like. `normalize` is a pure
//! function: no I/O, no clock, no randomness. The same input list always
//! produces the same report, byte for byte.

use crate::models::{
    Decision, EvidenceLevel, Exploitability, Issue, IssueInstance, IssueSource, NormalizedIssue,
    NormalizedIssueType, NormalizedReport, NormalizedSummary, Ownership, Posture, ScanTool,
    Severity,
};
use std::collections::HashMap;
use std::fmt;

/// Vulnerability category detected from the issue title.
///
/// Internal to classification; it drives severity fallbacks and the
/// reason/action templates but never appears in the report itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Injection,
    Xss,
    Auth,
    AccessControl,
    RateLimiting,
    Configuration,
    Crypto,
    SupplyChain,
    Unknown,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Injection => write!(f, "injection"),
            Category::Xss => write!(f, "xss"),
            Category::Auth => write!(f, "auth"),
            Category::AccessControl => write!(f, "access_control"),
            Category::RateLimiting => write!(f, "rate_limiting"),
            Category::Configuration => write!(f, "configuration"),
            Category::Crypto => write!(f, "crypto"),
            Category::SupplyChain => write!(f, "supply_chain"),
            Category::Unknown => write!(f, "unknown"),
        }
    }
}

/// One group of raw issues sharing a title, with the first-seen issue's
/// description, source and tool as representative metadata.
struct Group {
    title: String,
    description: String,
    source: IssueSource,
    tool: ScanTool,
    instances: Vec<IssueInstance>,
    proof_exists: bool,
}

/// Group raw issues by title and classify each group.
pub fn normalize(raw_issues: &[Issue]) -> NormalizedReport {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for issue in raw_issues {
        let position = match index.get(issue.title.as_str()) {
            Some(&position) => position,
            None => {
                groups.push(Group {
                    title: issue.title.clone(),
                    description: issue.description.clone(),
                    source: issue.source,
                    tool: issue.tool,
                    instances: Vec::new(),
                    proof_exists: false,
                });
                index.insert(issue.title.as_str(), groups.len() - 1);
                groups.len() - 1
            }
        };

        let snippet = issue.code_snippet.clone().unwrap_or_default();

        if issue.source == IssueSource::Runtime
            && (!snippet.is_empty()
                || issue.description.contains("Evidence:")
                || issue.description.contains("Proof:"))
        {
            groups[position].proof_exists = true;
        }

        let (path, line) = parse_location(&issue.location);
        groups[position].instances.push(IssueInstance {
            path,
            line,
            code_snippet: snippet,
        });
    }

    let issues: Vec<NormalizedIssue> = groups.iter().map(classify_group).collect();

    NormalizedReport {
        summary: calculate_summary(&issues, raw_issues.len()),
        issues,
    }
}

/// Split a `path:line` location into its parts.
///
/// The last `:`-separated segment is the line number only when it is a
/// bare non-negative integer; anything else keeps the whole string as
/// the path with line 0.
fn parse_location(location: &str) -> (String, u32) {
    if location.is_empty() {
        return ("unknown".to_string(), 0);
    }

    if let Some((path, tail)) = location.rsplit_once(':') {
        if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(line) = tail.parse::<u32>() {
                return (path.to_string(), line);
            }
        }
    }

    (location.to_string(), 0)
}

/// Detect the vulnerability category from the title. Rules are checked
/// in a fixed order; the first match wins.
fn detect_category(title: &str) -> Category {
    let t = title.to_lowercase();
    if ["injection", "sql", "nosql", "command"].iter().any(|x| t.contains(x)) {
        return Category::Injection;
    }
    if t.contains("xss") || t.contains("cross-site scripting") {
        return Category::Xss;
    }
    if ["auth", "jwt", "session", "password"].iter().any(|x| t.contains(x)) {
        return Category::Auth;
    }
    if t.contains("access control") || t.contains("authorization") {
        return Category::AccessControl;
    }
    if t.contains("rate limit") || t.contains("throttl") {
        return Category::RateLimiting;
    }
    if ["config", "header", "ssl", "tls"].iter().any(|x| t.contains(x)) {
        return Category::Configuration;
    }
    if t.contains("crypto") {
        return Category::Crypto;
    }
    if t.contains("dependency") || t.contains("vulnerable package") {
        return Category::SupplyChain;
    }
    Category::Unknown
}

/// Map a path to the layer that owns its remediation.
fn classify_ownership(path: &str) -> Ownership {
    if path.is_empty() || path == "unknown" {
        return Ownership::Unknown;
    }
    let p = path.to_lowercase();
    if ["/routes", "/controllers", "/core", "/services", "backend/"]
        .iter()
        .any(|x| p.contains(x))
    {
        return Ownership::Backend;
    }
    if ["/views", ".ejs", ".html", "frontend/", "template"]
        .iter()
        .any(|x| p.contains(x))
    {
        return Ownership::Frontend;
    }
    if [".env", "config/", "docker/", ".yaml", ".yml", "deployment"]
        .iter()
        .any(|x| p.contains(x))
    {
        return Ownership::Infra;
    }
    Ownership::Unknown
}

fn classify_evidence(source: IssueSource, tool: ScanTool, proof_exists: bool) -> EvidenceLevel {
    if source == IssueSource::Runtime && tool == ScanTool::OwaspZap && proof_exists {
        return EvidenceLevel::RuntimeConfirmed;
    }
    if source == IssueSource::Code {
        return EvidenceLevel::StaticDetected;
    }
    EvidenceLevel::Insufficient
}

/// Map a group to its severity. The title-based entries are checked
/// top-down and take precedence over both the exploitability bump and
/// the category fallback.
fn map_severity(title: &str, category: Category, exploitability: Exploitability) -> Severity {
    let t = title.to_lowercase();

    if t.contains("command injection") || t.contains("rce") {
        return Severity::High;
    }
    if t.contains("sql injection") {
        return Severity::High;
    }
    if t.contains("authentication bypass") || t.contains("auth bypass") {
        return Severity::High;
    }
    if t.contains("stored xss") {
        return Severity::High;
    }

    if t.contains("reflected xss") {
        return Severity::Medium;
    }
    if t.contains("rate limit") {
        return Severity::Medium;
    }

    if t.contains("open redirect") {
        return Severity::Low;
    }
    if t.contains("security header") || t.contains("missing header") {
        return Severity::Low;
    }

    if exploitability == Exploitability::Exploitable {
        return Severity::High;
    }

    match category {
        Category::Injection | Category::Auth | Category::AccessControl => Severity::High,
        Category::Xss | Category::RateLimiting => Severity::Medium,
        _ => Severity::Low,
    }
}

fn classify_group(group: &Group) -> NormalizedIssue {
    let category = detect_category(&group.title);

    let primary_path = group
        .instances
        .first()
        .map(|i| i.path.as_str())
        .unwrap_or("unknown");
    let ownership = classify_ownership(primary_path);

    let evidence_level = classify_evidence(group.source, group.tool, group.proof_exists);

    let (exploitability, seed_decision) = match evidence_level {
        EvidenceLevel::RuntimeConfirmed => (Exploitability::Exploitable, Decision::FixNow),
        EvidenceLevel::StaticDetected => (Exploitability::Theoretical, Decision::Backlog),
        EvidenceLevel::Insufficient => (Exploitability::Unknown, Decision::Review),
    };

    let severity = map_severity(&group.title, category, exploitability);

    // Overrides supersede the seed. The Low rule is unconditional: even a
    // runtime-confirmed exploitable finding scoring Low is routed to
    // ignore. Flagged in DESIGN.md for product review.
    let decision = if severity == Severity::High && exploitability == Exploitability::Exploitable {
        Decision::FixNow
    } else if severity == Severity::Low {
        Decision::Ignore
    } else {
        seed_decision
    };

    let reason = format!(
        "Detected {} via {}. Evidence: {}.",
        category, group.tool, evidence_level
    );
    let recommended_action = format!(
        "Verify {} in {} layer and apply sanitization or configuration fix.",
        category, ownership
    );

    NormalizedIssue {
        title: group.title.clone(),
        original_rule: group.title.clone(),
        ownership,
        issue_type: if category == Category::Configuration {
            NormalizedIssueType::Configuration
        } else {
            NormalizedIssueType::Security
        },
        severity,
        evidence_level,
        exploitability,
        decision,
        reason,
        recommended_action,
        instances: group.instances.clone(),
        source: group.source,
    }
}

fn calculate_summary(issues: &[NormalizedIssue], total_raw: usize) -> NormalizedSummary {
    let fix_now_count = issues.iter().filter(|i| i.decision == Decision::FixNow).count();
    let backlog_count = issues.iter().filter(|i| i.decision == Decision::Backlog).count();

    let posture = if fix_now_count > 5 {
        Posture::Weak
    } else if fix_now_count > 0 || backlog_count > 10 {
        Posture::Moderate
    } else {
        Posture::Good
    };

    let readiness = if fix_now_count == 0 {
        "Production Ready"
    } else {
        "Needs Remediation"
    };

    NormalizedSummary {
        overall_production_readiness: readiness.to_string(),
        total_raw_findings: total_raw,
        fix_now_count,
        backlog_count,
        posture,
    }
}
