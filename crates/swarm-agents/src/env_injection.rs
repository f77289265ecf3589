//! Per-run cost-attribution environment variables (§6).
//!
//! The executor sets these on every invocation so LiteLLM-fronted billing can
//! attribute spend back to a session/run, without the agent CLI itself
//! needing to know about it.

use std::collections::BTreeMap;

/// Claude-family header injection: `ANTHROPIC_CUSTOM_HEADERS` is a
/// newline-delimited list of `key: value` pairs. Existing user-provided
/// headers are preserved; `x-litellm-tags` gets the run tag appended rather
/// than replaced, everything else passes through untouched.
pub fn claude_custom_headers(existing: Option<&str>, session_tag: &str, run_id: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut saw_customer_id = false;
    let mut saw_tags = false;

    if let Some(existing) = existing {
        for line in existing.lines().filter(|l| !l.trim().is_empty()) {
            let key = line.split_once(':').map(|(k, _)| k.trim()).unwrap_or(line.trim());
            if key.eq_ignore_ascii_case("x-litellm-customer-id") {
                saw_customer_id = true;
                lines.push(format!("x-litellm-customer-id: {session_tag}"));
            } else if key.eq_ignore_ascii_case("x-litellm-tags") {
                saw_tags = true;
                let existing_value = line.split_once(':').map(|(_, v)| v.trim()).unwrap_or("");
                if existing_value.is_empty() {
                    lines.push(format!("x-litellm-tags: run:{run_id}"));
                } else {
                    lines.push(format!("x-litellm-tags: {existing_value},run:{run_id}"));
                }
            } else {
                lines.push(line.to_string());
            }
        }
    }
    if !saw_customer_id {
        lines.push(format!("x-litellm-customer-id: {session_tag}"));
    }
    if !saw_tags {
        lines.push(format!("x-litellm-tags: run:{run_id}"));
    }
    lines.join("\n")
}

/// Codex-family environment variables, consumed by the Codex config's
/// `env_http_headers` indirection rather than a raw header string.
pub fn codex_env_vars(session_tag: &str, run_id: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("EVOLVE_LITELLM_CUSTOMER_ID".to_string(), session_tag.to_string());
    vars.insert("EVOLVE_LITELLM_TAGS".to_string(), format!("run:{run_id}"));
    vars
}
