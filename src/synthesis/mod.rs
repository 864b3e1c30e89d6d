//! Client for the AI report synthesis backend.
//!
//! The backend is an OpenAI-compatible chat completions endpoint that is
//! asked to rewrite the raw aggregate into a [`NormalizedReport`]. Every
//! way the call can go wrong — missing key, transport failure, provider
//! error, code-fenced or malformed body, an error-tagged response — maps
//! to a [`SynthesisError`] so the pipeline can fall back to the
//! deterministic engine.

pub mod prompts;

use crate::models::{NormalizedReport, RawReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Failure of one synthesis attempt. Never fatal: the caller falls back
/// to deterministic normalization.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis API key is not configured")]
    MissingApiKey,

    #[error("failed to reach synthesis backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("synthesis provider returned status {status}: {detail}")]
    Provider { status: u16, detail: String },

    #[error("synthesis backend reported an error: {0}")]
    Backend(String),

    #[error("synthesis response is not valid JSON")]
    UnparseableBody,

    #[error("synthesis response does not match the report shape: {0}")]
    NonConforming(#[from] serde_json::Error),
}

/// Settings for the synthesis backend, passed in at construction.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: None,
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            timeout_seconds: 120,
        }
    }
}

/// Request payload sent to the backend, wrapping the raw aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub status: String,
    pub tool_summary: ToolSummary,
    pub raw_findings: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub tools: Vec<String>,
    pub total_raw_findings: usize,
}

impl SynthesisRequest {
    /// Package a raw report for synthesis, normalizing absent snippets
    /// to empty strings so the backend sees one consistent shape.
    pub fn from_raw_report(report: &RawReport) -> Self {
        let raw_findings = report
            .issues
            .iter()
            .map(|issue| {
                let mut value = serde_json::to_value(issue).unwrap_or(Value::Null);
                if let Some(object) = value.as_object_mut() {
                    let snippet = object
                        .get("code_snippet")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    object.insert("code_snippet".to_string(), Value::String(snippet));
                }
                value
            })
            .collect();

        Self {
            status: "success".to_string(),
            tool_summary: ToolSummary {
                tools: report
                    .summary
                    .tools_used
                    .iter()
                    .map(|t| t.to_string())
                    .collect(),
                total_raw_findings: report.summary.total_issues,
            },
            raw_findings,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for one synthesis backend.
pub struct SynthesisClient {
    config: SynthesisConfig,
    http_client: reqwest::Client,
}

impl SynthesisClient {
    pub fn new(config: SynthesisConfig) -> Result<Self, SynthesisError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Ask the backend to rewrite the raw aggregate into a normalized
    /// report.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        nosql_detected: bool,
    ) -> Result<NormalizedReport, SynthesisError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(SynthesisError::MissingApiKey)?;

        let payload_json =
            serde_json::to_string_pretty(request).map_err(SynthesisError::NonConforming)?;
        let user_prompt = prompts::report_user_prompt(&payload_json, nosql_detected);

        let chat_request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::REPORT_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        info!(
            "Requesting report synthesis from {} ({})",
            self.config.api_url, self.config.model
        );

        let response = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&chat_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 {
                error!("Synthesis backend rejected the API key (401 Unauthorized)");
            } else {
                error!("Synthesis backend error {}: {}", status, detail);
            }
            return Err(SynthesisError::Provider {
                status: status.as_u16(),
                detail,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");

        parse_report_content(content)
    }
}

/// Parse the model's reply into a report.
///
/// Code fences around the JSON body are tolerated; an `{"error": ...}`
/// object or anything that does not deserialize into the report shape
/// is a synthesis failure.
pub fn parse_report_content(content: &str) -> Result<NormalizedReport, SynthesisError> {
    let clean = strip_code_fences(content);

    let value: Value = match serde_json::from_str(clean) {
        Ok(value) => value,
        Err(_) => {
            error!("Synthesis response is not parseable JSON");
            return Err(SynthesisError::UnparseableBody);
        }
    };

    if let Some(message) = value.get("error") {
        let detail = message
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| message.to_string());
        return Err(SynthesisError::Backend(detail));
    }

    Ok(serde_json::from_value(value)?)
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fences(content: &str) -> &str {
    let mut clean = content.trim();

    if let Some(rest) = clean.strip_prefix("```json") {
        clean = rest;
    } else if let Some(rest) = clean.strip_prefix("```") {
        clean = rest;
    }
    if let Some(rest) = clean.strip_suffix("```") {
        clean = rest;
    }

    clean.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Issue, IssueSource, IssueType, ScanSummary, ScanTool, Severity};

    fn raw_report() -> RawReport {
        RawReport {
            summary: ScanSummary {
                repo_scanned: true,
                deploy_scanned: false,
                tools_used: vec![ScanTool::Semgrep, ScanTool::OwaspZap],
                total_issues: 1,
            },
            issues: vec![Issue {
                source: IssueSource::Code,
                tool: ScanTool::Semgrep,
                issue_type: IssueType::SecurityVulnerability,
                severity: Severity::High,
                title: "SQL Injection".to_string(),
                description: "tainted".to_string(),
                location: "src/db.js:3".to_string(),
                code_snippet: None,
            }],
        }
    }

    #[test]
    fn test_request_uses_camel_case_keys() {
        let request = SynthesisRequest::from_raw_report(&raw_report());
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"toolSummary\""));
        assert!(json.contains("\"totalRawFindings\":1"));
        assert!(json.contains("\"rawFindings\""));
        assert!(json.contains("\"status\":\"success\""));
    }

    #[test]
    fn test_request_sanitizes_absent_snippets() {
        let request = SynthesisRequest::from_raw_report(&raw_report());
        let finding = &request.raw_findings[0];

        assert_eq!(finding.get("code_snippet").unwrap(), "");
        assert_eq!(request.tool_summary.tools, vec!["Semgrep", "OWASP ZAP"]);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_valid_report() {
        let content = r#"```json
        {
          "summary": {
            "overall_production_readiness": "Needs Remediation",
            "total_raw_findings": 1,
            "fix_now_count": 1,
            "backlog_count": 0,
            "posture": "moderate"
          },
          "issues": []
        }
        ```"#;

        let report = parse_report_content(content).unwrap();
        assert_eq!(report.summary.fix_now_count, 1);
    }

    #[test]
    fn test_parse_error_tagged_content() {
        let result = parse_report_content(r#"{"error": "LLM Provider Error: 401 Unauthorized."}"#);
        match result {
            Err(SynthesisError::Backend(detail)) => assert!(detail.contains("401")),
            other => panic!("expected backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_non_json_body() {
        let result = parse_report_content("I could not produce a report, sorry.");
        assert!(matches!(result, Err(SynthesisError::UnparseableBody)));
    }

    #[test]
    fn test_parse_wrong_shape_is_non_conforming() {
        let result = parse_report_content(r#"{"summary": "not-an-object"}"#);
        assert!(matches!(result, Err(SynthesisError::NonConforming(_))));
    }

    #[test]
    fn test_missing_api_key_fails_before_any_io() {
        let client = SynthesisClient::new(SynthesisConfig::default()).unwrap();
        let request = SynthesisRequest::from_raw_report(&raw_report());

        let result = tokio_test::block_on(client.synthesize(&request, false));
        assert!(matches!(result, Err(SynthesisError::MissingApiKey)));
    }
}
