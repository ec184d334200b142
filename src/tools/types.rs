//! Tool declaration types
//!
//! Every tool declares a name, a JSON Schema for its input, and an
//! idempotency classification. Side-effecting tools are invoked at most
//! once per orchestrator iteration; safe tools may be retried.

use serde::{Deserialize, Serialize};

/// Tool declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name, the dispatch key
    pub name: String,

    /// Human/model-readable description
    pub description: String,

    /// Parameter schema (JSON Schema object)
    pub parameters: serde_json::Value,

    /// Whether invoking this tool changes external state. Side-effecting
    /// tools are never automatically retried.
    pub side_effecting: bool,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        side_effecting: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            side_effecting,
        }
    }

    /// Validate an argument object against this schema.
    ///
    /// Checks the `required` list and the declared `type` of each provided
    /// property — the subset of JSON Schema the registry's tools use.
    pub fn validate(&self, args: &serde_json::Value) -> std::result::Result<(), String> {
        let Some(object) = args.as_object() else {
            return Err("arguments must be a JSON object".to_string());
        };

        let properties = self
            .parameters
            .get("properties")
            .and_then(|p| p.as_object());

        if let Some(required) = self.parameters.get("required").and_then(|r| r.as_array()) {
            for name in required.iter().filter_map(|r| r.as_str()) {
                if !object.contains_key(name) {
                    return Err(format!("missing required field: {}", name));
                }
            }
        }

        if let Some(properties) = properties {
            for (key, value) in object {
                let Some(spec) = properties.get(key) else {
                    return Err(format!("unexpected field: {}", key));
                };
                if let Some(expected) = spec.get("type").and_then(|t| t.as_str()) {
                    let ok = match expected {
                        "string" => value.is_string(),
                        "number" => value.is_number(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !ok {
                        return Err(format!("field {} must be a {}", key, expected));
                    }
                }
            }
        }

        Ok(())
    }
}
