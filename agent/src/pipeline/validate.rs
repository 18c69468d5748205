//! Parameter schema validation and type coercion (spec.md §4.3 step 5).

use serde_json::{Map, Value};

use crate::types::ToolDefinition;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required parameter '{0}'")]
    MissingRequired(String),
    #[error("parameter '{name}' expected type {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

/// Validate `args` against `tool.parameters` (a JSON-schema-like object with
/// `properties` and `required`), coercing values in place where the schema
/// allows it. Returns the coerced map or the first validation error found.
pub fn validate_and_coerce(
    tool: &ToolDefinition,
    args: Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let properties = tool
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let required: Vec<String> = tool
        .parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    for name in &required {
        if !args.contains_key(name) {
            return Err(ValidationError::MissingRequired(name.clone()));
        }
    }

    let mut coerced = Map::new();
    for (name, value) in args.into_iter() {
        let Some(schema) = properties.get(&name) else {
            // Unknown-typed properties pass through untouched.
            coerced.insert(name, value);
            continue;
        };
        let param_type = schema.get("type").and_then(Value::as_str).unwrap_or("");
        let coerced_value = coerce(&name, value, param_type)?;
        coerced.insert(name, coerced_value);
    }
    Ok(coerced)
}

fn coerce(name: &str, value: Value, param_type: &str) -> Result<Value, ValidationError> {
    match param_type {
        "number" => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Value::from_f64)
                .ok_or_else(|| type_mismatch(name, "number", &value)),
            _ => Err(type_mismatch(name, "number", &value)),
        },
        "integer" => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::Number(n) => {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.fract() == 0.0 {
                    Ok(Value::from(f as i64))
                } else {
                    Err(type_mismatch(name, "integer", &value))
                }
            }
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| type_mismatch(name, "integer", &value)),
            _ => Err(type_mismatch(name, "integer", &value)),
        },
        "boolean" => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(type_mismatch(name, "boolean", &value)),
            },
            _ => Err(type_mismatch(name, "boolean", &value)),
        },
        "array" => match &value {
            Value::Array(_) => Ok(value),
            Value::String(s) if s.trim_start().starts_with('[') => {
                serde_json::from_str(s).map_err(|_| type_mismatch(name, "array", &value))
            }
            _ => Err(type_mismatch(name, "array", &value)),
        },
        "object" => match &value {
            Value::Object(_) => Ok(value),
            Value::String(s) if s.trim_start().starts_with('{') => {
                serde_json::from_str(s).map_err(|_| type_mismatch(name, "object", &value))
            }
            _ => Err(type_mismatch(name, "object", &value)),
        },
        // string or unrecognized schema type: pass through.
        _ => Ok(value),
    }
}

fn type_mismatch(name: &str, expected: &str, actual: &Value) -> ValidationError {
    ValidationError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        actual: value_type_name(actual).to_string(),
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolMetadata;

    fn tool(schema: Value) -> ToolDefinition {
        ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: schema,
            metadata: ToolMetadata::default(),
        }
    }

    #[test]
    fn missing_required_errors() {
        let t = tool(serde_json::json!({
            "properties": {"project": {"type": "string"}},
            "required": ["project"]
        }));
        let result = validate_and_coerce(&t, Map::new());
        assert!(matches!(result, Err(ValidationError::MissingRequired(_))));
    }

    #[test]
    fn coerces_stringly_typed_booleans_and_integers() {
        let t = tool(serde_json::json!({
            "properties": {
                "verbose": {"type": "boolean"},
                "limit": {"type": "integer"}
            }
        }));
        let mut args = Map::new();
        args.insert("verbose".into(), Value::String("true".into()));
        args.insert("limit".into(), Value::String("5".into()));
        let out = validate_and_coerce(&t, args).unwrap();
        assert_eq!(out["verbose"], Value::Bool(true));
        assert_eq!(out["limit"], Value::from(5));
    }

    #[test]
    fn rejects_non_whole_float_as_integer() {
        let t = tool(serde_json::json!({ "properties": { "limit": {"type": "integer"} } }));
        let mut args = Map::new();
        args.insert("limit".into(), Value::from(2.5));
        assert!(validate_and_coerce(&t, args).is_err());
    }

    #[test]
    fn unknown_properties_pass_through() {
        let t = tool(serde_json::json!({ "properties": {} }));
        let mut args = Map::new();
        args.insert("extra".into(), Value::String("whatever".into()));
        let out = validate_and_coerce(&t, args).unwrap();
        assert_eq!(out["extra"], Value::String("whatever".into()));
    }
}
