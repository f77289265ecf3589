//! Tagged-union schema abstraction (design note: "Dynamic schema dispatch").
//!
//! Replaces a runtime "does this object look like a Zod schema" duck-typing
//! check with an explicit enum the executor can match on without knowing
//! which flavor of validator produced it.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Either a native closure-based validator, or a JSON Schema document
/// validated via the `jsonschema` crate.
#[derive(Clone)]
pub enum Schema {
    Native(NativeSchema),
    JsonSchema(JsonSchemaDef),
}

/// A validator expressed as a plain Rust closure over a `serde_json::Value`.
#[derive(Clone)]
pub struct NativeSchema {
    name: &'static str,
    validate: Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>,
}

impl fmt::Debug for NativeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSchema").field("name", &self.name).finish()
    }
}

/// A JSON Schema document, compiled into a validator on first use and
/// cached for every call after — `jsonschema::validator_for` walks and
/// resolves the whole document, which is wasted work to repeat per
/// `validate()` call on a schema that never changes.
#[derive(Clone)]
pub struct JsonSchemaDef {
    document: serde_json::Value,
    compiled: OnceLock<Arc<jsonschema::Validator>>,
}

impl fmt::Debug for JsonSchemaDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaDef").finish()
    }
}

impl Schema {
    pub fn native(
        name: &'static str,
        validate: impl Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Schema::Native(NativeSchema {
            name,
            validate: Arc::new(validate),
        })
    }

    pub fn json_schema(document: serde_json::Value) -> Self {
        Schema::JsonSchema(JsonSchemaDef {
            document,
            compiled: OnceLock::new(),
        })
    }

    /// Validates `value`, returning a human-readable message on failure.
    /// The executor calls this after parsing `output/result.json`; a
    /// failure there becomes an in-band `status=error` result, never a
    /// panic or thrown error.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), String> {
        match self {
            Schema::Native(n) => (n.validate)(value),
            Schema::JsonSchema(j) => {
                let compiled = match j.compiled.get() {
                    Some(v) => v,
                    None => {
                        let v = jsonschema::validator_for(&j.document).map_err(|e| format!("invalid schema document: {e}"))?;
                        j.compiled.get_or_init(|| Arc::new(v))
                    }
                };
                let errors: Vec<String> = compiled.iter_errors(value).map(|e| e.to_string()).collect();
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(errors.join("; "))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_schema_validates() {
        let schema = Schema::native("has_name", |v| {
            if v.get("name").is_some() {
                Ok(())
            } else {
                Err("missing `name`".to_string())
            }
        });
        assert!(schema.validate(&json!({"name": "a"})).is_ok());
        assert!(schema.validate(&json!({})).is_err());
    }

    #[test]
    fn json_schema_validates() {
        let schema = Schema::json_schema(json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        }));
        assert!(schema.validate(&json!({"name": "a"})).is_ok());
        assert!(schema.validate(&json!({"name": 1})).is_err());
    }
}
