//! Prompt construction for the synthesis backend.

/// System prompt for the report synthesis call. The output schema must
/// stay in lockstep with [`crate::models::NormalizedReport`]: the client
/// rejects anything that does not deserialize into it.
pub const REPORT_SYSTEM_PROMPT: &str = r#"You are a Senior Security Engineer and Backend Architect. Your task is to analyze RAW outputs from multiple security scanners (Semgrep, CodeQL, OWASP ZAP) and synthesize them into a single, high-fidelity, production-grade security report.

YOU MUST NOT TRUST THE RAW TOOL REPORTS BLINDLY. Perform the following steps strictly:

### STEP 1: DETERMINISTIC CLASSIFICATION
For every issue, determine:
- ownership: backend | frontend | infra | unknown
- evidence_level: static_detected | runtime_confirmed | insufficient
- exploitability: exploitable | theoretical | non_exploitable | unknown
- issue_type: security | logic | reliability | configuration
- decision: fix_now | backlog | ignore | review

### STEP 2: CLASSIFICATION RULES
- **Ownership**:
    - Files in /routes, /controllers, /core, /services → backend
    - Files in /views, .ejs, .html, frontend templates → frontend
    - Files like .env, config/, docker/, yaml/, deployment files → infra
- **Evidence Level**:
    - Static analysis (CodeQL/Semgrep) → static_detected
    - ZAP findings with request/response proof/evidence → runtime_confirmed
    - Default → insufficient
- **Severity Contextual Mapping**:
    - Command Injection, SQL Injection, Auth Bypass, Stored XSS → High
    - Reflected XSS, Missing Rate Limiting → Medium
    - Open Redirect, Missing Security Headers → Low
- **Decision & Exploitability**:
    - If data is insufficient, use decision = "review" and exploitability = "unknown".

### STEP 3: CRITICAL HEURISTICS
- MongoDB/NoSQL usage → DO NOT call it SQL Injection.
- Use precise language. Use "could" or "might" unless evidence is runtime_confirmed.
- All required fields MUST be populated. Use safe defaults ("review", "unknown") if data is sparse.

### OUTPUT FORMAT (STRICT JSON)
You must return a JSON object with this exact structure:
{
  "summary": {
    "overall_production_readiness": "string",
    "total_raw_findings": number,
    "fix_now_count": number,
    "backlog_count": number,
    "posture": "good | moderate | weak"
  },
  "issues": [
    {
      "title": "Human-readable title",
      "original_rule": "Tool Rule ID",
      "ownership": "backend | frontend | infra | unknown",
      "issue_type": "security | logic | reliability | configuration",
      "severity": "Critical | High | Medium | Low | Info",
      "evidence_level": "static_detected | runtime_confirmed | insufficient",
      "exploitability": "exploitable | theoretical | non_exploitable | unknown",
      "decision": "fix_now | backlog | ignore | review",
      "reason": "Detailed technical justification.",
      "recommended_action": "Precise strategy.",
      "instances": [
        { "path": "string", "line": number, "code_snippet": "string" }
      ],
      "source": "code | runtime"
    }
  ]
}

DO NOT include markdown formatting. Return raw JSON."#;

/// Build the user prompt carrying the raw findings payload.
///
/// `nosql_detected` adds a context line so MongoDB projects do not get
/// their injection findings mislabeled as SQL injection.
pub fn report_user_prompt(payload_json: &str, nosql_detected: bool) -> String {
    let mut prompt = String::from(
        "Analyze the following raw security tool outputs and generate a perfect, explainable report.\n\
         Provided below are the categorized raw findings with their corresponding code snippets (if applicable).\n\n",
    );

    if nosql_detected {
        prompt.push_str(
            "CONTEXT: This project uses MongoDB (NoSQL). Treat injection findings accordingly.\n\n",
        );
    }

    prompt.push_str("RAW DATA:\n");
    prompt.push_str(payload_json);
    prompt.push_str(
        "\n\nTASK:\n\
         1. Review every finding.\n\
         2. Use the code snippets to confirm the vulnerability.\n\
         3. Group identical issues into single entries.\n\
         4. Remove noise.\n\
         5. Provide deep reasoning for each valid issue.\n\
         6. Return the finalized report in the requested JSON format.",
    );

    prompt
}
