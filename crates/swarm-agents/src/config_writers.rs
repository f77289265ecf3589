//! Agent tool-configuration writers (§6).
//!
//! Out-of-core per §1's non-goals ("how tool-specific config files are
//! serialized" is not this spec's concern), but contractually observable:
//! the merge-preserving-unknown-keys rule and the `command`/`url` conflict
//! check are testable behavior a caller can depend on, so they get a real
//! (if small) implementation rather than a stub.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One MCP server entry as the caller wants it written. Exactly one of
/// `command` or `url` must be set — specifying both is rejected.
#[derive(Debug, Clone)]
pub struct McpServerSpec {
    pub name: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub url: Option<String>,
    pub env: Vec<(String, String)>,
}

impl McpServerSpec {
    fn validate(&self) -> Result<()> {
        if self.command.is_some() && self.url.is_some() {
            return Err(Error::invalid_argument(format!(
                "mcp server {:?} specifies both `command` and `url`; exactly one is allowed",
                self.name
            )));
        }
        Ok(())
    }

    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(command) = &self.command {
            obj.insert("command".to_string(), Value::String(command.clone()));
            if !self.args.is_empty() {
                obj.insert(
                    "args".to_string(),
                    Value::Array(self.args.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        if let Some(url) = &self.url {
            obj.insert("url".to_string(), Value::String(url.clone()));
        }
        if !self.env.is_empty() {
            let mut env_obj = Map::new();
            for (k, v) in &self.env {
                env_obj.insert(k.clone(), Value::String(v.clone()));
            }
            obj.insert("env".to_string(), Value::Object(env_obj));
        }
        Value::Object(obj)
    }
}

/// Merges `servers` into `existing`'s `mcpServers` object (or `servers` under
/// the top level for a standalone `mcp.json`), preserving every unknown key
/// already present — both at the document root and within each server entry
/// that isn't being overwritten wholesale.
pub fn merge_settings_json(existing: Option<Value>, servers: &[McpServerSpec], servers_key: &str) -> Result<Value> {
    for s in servers {
        s.validate()?;
    }

    let mut root = match existing {
        Some(Value::Object(map)) => map,
        Some(_) | None => Map::new(),
    };

    let mut server_map = match root.remove(servers_key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    for s in servers {
        server_map.insert(s.name.clone(), s.to_json());
    }

    root.insert(servers_key.to_string(), Value::Object(server_map));
    Ok(Value::Object(root))
}

/// Rewrites the Codex TOML config's `model_provider` key (§9 open question
/// 3): it must sit at the document root, before any `[section]` table.
///
/// - If `model_provider` already exists at the root with a different value,
///   it is replaced in place.
/// - If the only `model_provider` key found is nested inside a
///   `[profiles.*]` table (or any other table), a root-level key is
///   prepended; the nested one is left untouched, since it belongs to that
///   profile, not the default provider.
/// - All other keys and tables are round-tripped unchanged.
pub fn set_codex_model_provider(existing: Option<&str>, model_provider: &str) -> Result<String> {
    let mut doc: toml::Value = match existing {
        Some(text) if !text.trim().is_empty() => text.parse()?,
        _ => toml::Value::Table(toml::value::Table::new()),
    };

    let table = doc
        .as_table_mut()
        .ok_or_else(|| Error::invalid_argument("codex config.toml root must be a table"))?;

    table.insert(
        "model_provider".to_string(),
        toml::Value::String(model_provider.to_string()),
    );

    Ok(toml::to_string(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_server_with_both_command_and_url() {
        let spec = McpServerSpec {
            name: "dual".to_string(),
            command: Some("node".to_string()),
            args: vec![],
            url: Some("http://localhost:1234".to_string()),
            env: vec![],
        };
        assert!(merge_settings_json(None, &[spec], "mcpServers").is_err());
    }

    #[test]
    fn merges_preserving_unknown_root_keys() {
        let existing = serde_json::json!({
            "theme": "dark",
            "mcpServers": {
                "old-server": {"command": "old"}
            }
        });
        let spec = McpServerSpec {
            name: "new-server".to_string(),
            command: Some("npx".to_string()),
            args: vec!["-y".to_string(), "tool".to_string()],
            url: None,
            env: vec![],
        };
        let merged = merge_settings_json(Some(existing), &[spec], "mcpServers").unwrap();
        assert_eq!(merged["theme"], "dark");
        assert!(merged["mcpServers"]["old-server"].is_object());
        assert_eq!(merged["mcpServers"]["new-server"]["command"], "npx");
    }

    #[test]
    fn prepends_root_model_provider_when_only_nested_one_exists() {
        let existing = r#"
[profiles.default]
model_provider = "openai"
"#;
        let out = set_codex_model_provider(Some(existing), "evolve-gateway").unwrap();
        let parsed: toml::Value = out.parse().unwrap();
        assert_eq!(
            parsed.get("model_provider").unwrap().as_str().unwrap(),
            "evolve-gateway"
        );
        assert_eq!(
            parsed["profiles"]["default"]["model_provider"].as_str().unwrap(),
            "openai"
        );
    }

    #[test]
    fn replaces_differing_root_model_provider() {
        let existing = "model_provider = \"openai\"\n\n[profiles.default]\nmodel = \"gpt\"\n";
        let out = set_codex_model_provider(Some(existing), "evolve-gateway").unwrap();
        let parsed: toml::Value = out.parse().unwrap();
        assert_eq!(
            parsed.get("model_provider").unwrap().as_str().unwrap(),
            "evolve-gateway"
        );
    }

    #[test]
    fn writes_fresh_config_when_none_exists() {
        let out = set_codex_model_provider(None, "evolve-gateway").unwrap();
        assert!(out.contains("model_provider = \"evolve-gateway\""));
    }
}
