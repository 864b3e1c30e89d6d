//! Evidence extraction: source-context windows for code findings.
//!
//! After the raw report is built, every code-sourced issue with a
//! `path:line` location gets a numbered window of surrounding lines
//! from the workspace checkout. Runtime findings and issues without a
//! resolvable location are left alone.

use crate::models::{Issue, IssueSource};
use std::path::Path;
use tracing::debug;

/// Attach context windows of `context_lines` lines on each side.
pub fn attach_snippets(issues: &mut [Issue], repo_path: &Path, context_lines: usize) {
    let mut attached = 0usize;

    for issue in issues.iter_mut() {
        if issue.source != IssueSource::Code {
            continue;
        }
        let Some((path, line)) = split_file_location(&issue.location) else {
            continue;
        };

        let full_path = repo_path.join(path);
        let Ok(content) = std::fs::read_to_string(&full_path) else {
            continue;
        };

        if let Some(snippet) = window(&content, line, context_lines) {
            issue.code_snippet = Some(snippet);
            attached += 1;
        }
    }

    debug!("Attached context snippets to {} issues", attached);
}

/// Split a `path:line` location. `None` when the tail is not a line
/// number, which marks the location as unresolvable for file reads.
fn split_file_location(location: &str) -> Option<(&str, usize)> {
    let (path, tail) = location.rsplit_once(':')?;
    if path.is_empty() || tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((path, tail.parse().ok()?))
}

/// Build a numbered window around a 1-based line.
fn window(content: &str, line: usize, context_lines: usize) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let start = line.saturating_sub(context_lines).saturating_sub(1);
    let end = (line + context_lines).min(lines.len());
    if start >= end {
        // Reported line lies past the end of the file.
        return None;
    }

    let mut snippet = String::new();
    for (offset, text) in lines[start..end].iter().enumerate() {
        snippet.push_str(&format!("{:3} | {}\n", start + offset + 1, text));
    }
    Some(snippet)
}
