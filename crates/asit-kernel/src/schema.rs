//! Schema-engine seam.
//!
//! Leaf documents are checked against static schema documents through
//! [`SchemaEngine`]. Any JSON-Schema-compatible engine can sit behind the
//! trait; [`StructuralSchemaEngine`] covers the subset the leaf contracts
//! use: `type`, `required`, `properties`, `items`, `minItems`, `minLength`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType,
    TooShort,
}

/// One schema violation, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    pub kind: ViolationKind,
    pub path: String,
    pub message: String,
}

pub trait SchemaEngine: Send + Sync {
    /// Violations of `instance` against `schema`, in schema order.
    fn validate(&self, schema: &Value, instance: &Value) -> Vec<SchemaViolation>;
}

/// Built-in engine for the structural subset of JSON Schema.
///
/// Required keys are visited in the order the schema lists them, then the
/// remaining declared properties, so violation lists are stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralSchemaEngine;

impl SchemaEngine for StructuralSchemaEngine {
    fn validate(&self, schema: &Value, instance: &Value) -> Vec<SchemaViolation> {
        let mut out = Vec::new();
        check(schema, instance, "", &mut out);
        out
    }
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "document" } else { path }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn check(schema: &Value, instance: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, instance)) {
            out.push(SchemaViolation {
                kind: ViolationKind::WrongType,
                path: path.to_string(),
                message: format!("{} must be {}", display_path(path), allowed.join(" or ")),
            });
            return;
        }
    }

    match instance {
        Value::Object(fields) => check_object(schema, fields, path, out),
        Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64)
                && (items.len() as u64) < min
            {
                out.push(SchemaViolation {
                    kind: ViolationKind::TooShort,
                    path: path.to_string(),
                    message: format!(
                        "{} must contain at least {min} item(s)",
                        display_path(path)
                    ),
                });
            }
            if let Some(item_schema) = schema.get("items") {
                for (idx, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{idx}]"), out);
                }
            }
        }
        Value::String(text) => {
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
                && (text.trim().chars().count() as u64) < min
            {
                out.push(SchemaViolation {
                    kind: ViolationKind::TooShort,
                    path: path.to_string(),
                    message: format!("{} must be a non-empty string", display_path(path)),
                });
            }
        }
        _ => {}
    }
}

fn check_object(
    schema: &Map<String, Value>,
    fields: &Map<String, Value>,
    path: &str,
    out: &mut Vec<SchemaViolation>,
) {
    let properties = schema.get("properties").and_then(Value::as_object);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for key in &required {
        let child = join(path, key);
        match fields.get(*key) {
            None | Some(Value::Null) => out.push(SchemaViolation {
                kind: ViolationKind::Missing,
                message: format!("{child} is required"),
                path: child,
            }),
            Some(value) => {
                if let Some(sub) = properties.and_then(|p| p.get(*key)) {
                    check(sub, value, &child, out);
                }
            }
        }
    }

    let Some(properties) = properties else {
        return;
    };
    for (key, sub) in properties {
        if required.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = fields.get(key).filter(|v| !v.is_null()) {
            check(sub, value, &join(path, key), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend_schema() -> Value {
        json!({
            "type": "object",
            "required": ["quantum_backend"],
            "properties": {
                "quantum_backend": {
                    "type": "object",
                    "required": ["primary", "fallback", "providers"],
                    "properties": {
                        "primary": {"type": "string", "minLength": 1},
                        "fallback": {"type": "string", "minLength": 1},
                        "providers": {"type": "array", "minItems": 1, "items": {"type": "string"}}
                    }
                },
                "notes": {"type": "string"}
            }
        })
    }

    #[test]
    fn reports_missing_fields_in_required_order() {
        let violations = StructuralSchemaEngine.validate(
            &backend_schema(),
            &json!({"quantum_backend": {"primary": "p"}}),
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["quantum_backend.fallback", "quantum_backend.providers"]
        );
        assert!(violations.iter().all(|v| v.kind == ViolationKind::Missing));
    }

    #[test]
    fn type_mismatch_stops_descent() {
        let violations =
            StructuralSchemaEngine.validate(&backend_schema(), &json!({"quantum_backend": "p"}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::WrongType);
        assert_eq!(violations[0].message, "quantum_backend must be object");
    }

    #[test]
    fn checks_optional_properties_and_array_items() {
        let violations = StructuralSchemaEngine.validate(
            &backend_schema(),
            &json!({
                "quantum_backend": {"primary": " ", "fallback": "f", "providers": [1]},
                "notes": 3
            }),
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "quantum_backend.primary",
                "quantum_backend.providers[0]",
                "notes"
            ]
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let violations = StructuralSchemaEngine
            .validate(&backend_schema(), &json!({"quantum_backend": null}));
        assert_eq!(violations[0].kind, ViolationKind::Missing);
    }
}
