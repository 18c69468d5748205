//! Schema optimization applied once per tool when indexing (spec.md §4.1
//! "Schema optimization"): shrinks descriptions, flattens nested objects,
//! caps enum lists, and collapses `oneOf`/`anyOf`.

use serde_json::Value;
use turnkit_core::strutil::safe_truncate;

use crate::types::ToolDefinition;
use turnkit_core::config::SchemaOptimizationConfig;

/// Produce an optimized copy of `tool` per `cfg`. A no-op clone when
/// optimization is disabled.
pub fn optimize_tool(tool: &ToolDefinition, cfg: &SchemaOptimizationConfig) -> ToolDefinition {
    if !cfg.enabled {
        return tool.clone();
    }
    let mut out = tool.clone();
    out.description = truncate_description(&tool.description, cfg.max_description_length);
    out.parameters = optimize_schema(&tool.parameters, cfg);
    out
}

fn truncate_description(desc: &str, max_len: usize) -> String {
    if desc.len() <= max_len {
        desc.to_string()
    } else {
        safe_truncate(desc, max_len).to_string()
    }
}

/// Recursively optimize a JSON-schema-like value.
pub fn optimize_schema(schema: &Value, cfg: &SchemaOptimizationConfig) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                match k.as_str() {
                    "description" if v.is_string() => {
                        let s = v.as_str().unwrap_or_default();
                        out.insert(
                            k.clone(),
                            Value::String(truncate_description(s, cfg.max_description_length)),
                        );
                    }
                    "enum" if cfg.simplify_complex_types => {
                        if let Some(arr) = v.as_array() {
                            let capped: Vec<Value> =
                                arr.iter().take(cfg.max_enum_values).cloned().collect();
                            out.insert(k.clone(), Value::Array(capped));
                        } else {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                    "oneOf" | "anyOf" if cfg.simplify_complex_types => {
                        if let Some(arr) = v.as_array() {
                            if arr.len() == 1 {
                                // Inline the single branch directly into this object.
                                if let Some(branch) = arr[0].as_object() {
                                    for (bk, bv) in branch {
                                        out.insert(bk.clone(), optimize_schema(bv, cfg));
                                    }
                                }
                            } else if arr.len() > 3 {
                                let kept: Vec<Value> = arr
                                    .iter()
                                    .take(3)
                                    .map(|v| optimize_schema(v, cfg))
                                    .collect();
                                out.insert(k.clone(), Value::Array(kept));
                            } else {
                                let kept: Vec<Value> =
                                    arr.iter().map(|v| optimize_schema(v, cfg)).collect();
                                out.insert(k.clone(), Value::Array(kept));
                            }
                        } else {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                    "properties" if cfg.flatten_nested_objects => {
                        out.insert(k.clone(), flatten_properties(v, cfg));
                    }
                    _ => {
                        out.insert(k.clone(), optimize_schema(v, cfg));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(|v| optimize_schema(v, cfg)).collect())
        }
        other => other.clone(),
    }
}

/// Flatten a single level of nested `object` properties: a nested object
/// property's own properties are hoisted with a dotted name
/// (`parent.child`), keeping the schema indexable/flat for the embedding
/// text builder while not destroying the original structure's leaves.
fn flatten_properties(properties: &Value, cfg: &SchemaOptimizationConfig) -> Value {
    let Some(map) = properties.as_object() else {
        return properties.clone();
    };
    let mut out = serde_json::Map::new();
    for (prop_name, prop_schema) in map {
        let is_nested_object = prop_schema
            .get("type")
            .and_then(Value::as_str)
            .map_or(false, |t| t == "object")
            && prop_schema.get("properties").is_some();
        if is_nested_object {
            if let Some(nested_props) = prop_schema.get("properties").and_then(Value::as_object) {
                for (child_name, child_schema) in nested_props {
                    let flat_name = format!("{prop_name}.{child_name}");
                    out.insert(flat_name, optimize_schema(child_schema, cfg));
                }
                continue;
            }
        }
        out.insert(prop_name.clone(), optimize_schema(prop_schema, cfg));
    }
    Value::Object(out)
}

/// Build the indexable text the embedding is computed over (spec.md §4.1
/// "Embeddings & cache"): name/description/categories/tags/keywords/
/// parameter names+types+descriptions/up to 3 examples, with name+description
/// repeated `max(0, importance-5)` extra times to weight importance.
pub fn indexable_text(tool: &ToolDefinition) -> String {
    let mut parts = vec![tool.name.clone(), tool.description.clone()];
    parts.extend(tool.metadata.categories.iter().cloned());
    parts.extend(tool.metadata.tags.iter().cloned());
    parts.extend(tool.metadata.keywords.iter().cloned());

    if let Some(props) = tool.parameters.get("properties").and_then(Value::as_object) {
        for (name, schema) in props {
            let ty = schema.get("type").and_then(Value::as_str).unwrap_or("");
            let desc = schema.get("description").and_then(Value::as_str).unwrap_or("");
            parts.push(format!("{name} {ty} {desc}"));
        }
    }

    for example in tool.metadata.examples.iter().take(3) {
        parts.push(example.clone());
    }

    let weight = tool.metadata.importance.saturating_sub(5) as usize;
    for _ in 0..weight {
        parts.push(tool.name.clone());
        parts.push(tool.description.clone());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolMetadata;

    fn tool_with_schema(schema: Value) -> ToolDefinition {
        ToolDefinition {
            name: "t".into(),
            description: "d".repeat(200),
            parameters: schema,
            metadata: ToolMetadata::default(),
        }
    }

    #[test]
    fn truncates_long_description() {
        let cfg = SchemaOptimizationConfig::default();
        let tool = tool_with_schema(serde_json::json!({}));
        let out = optimize_tool(&tool, &cfg);
        assert_eq!(out.description.len(), cfg.max_description_length);
    }

    #[test]
    fn caps_enum_values() {
        let cfg = SchemaOptimizationConfig::default();
        let schema = serde_json::json!({
            "properties": { "x": { "type": "string", "enum": ["a","b","c","d","e","f","g","h"] } }
        });
        let out = optimize_schema(&schema, &cfg);
        let enum_vals = out["properties"]["x"]["enum"].as_array().unwrap();
        assert_eq!(enum_vals.len(), 7);
    }

    #[test]
    fn inlines_single_branch_one_of() {
        let cfg = SchemaOptimizationConfig::default();
        let schema = serde_json::json!({
            "oneOf": [ { "type": "string" } ]
        });
        let out = optimize_schema(&schema, &cfg);
        assert_eq!(out["type"], "string");
        assert!(out.get("oneOf").is_none());
    }

    #[test]
    fn truncates_any_of_over_three_branches() {
        let cfg = SchemaOptimizationConfig::default();
        let schema = serde_json::json!({
            "anyOf": [
                {"type": "string"}, {"type": "number"}, {"type": "boolean"},
                {"type": "integer"}, {"type": "array"}
            ]
        });
        let out = optimize_schema(&schema, &cfg);
        assert_eq!(out["anyOf"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn flattens_nested_object_properties() {
        let cfg = SchemaOptimizationConfig::default();
        let schema = serde_json::json!({
            "properties": {
                "location": {
                    "type": "object",
                    "properties": {
                        "city": {"type": "string"},
                        "zip": {"type": "string"}
                    }
                },
                "count": {"type": "integer"}
            }
        });
        let out = optimize_schema(&schema, &cfg);
        let props = out["properties"].as_object().unwrap();
        assert!(props.contains_key("location.city"));
        assert!(props.contains_key("location.zip"));
        assert!(props.contains_key("count"));
        assert!(!props.contains_key("location"));
    }

    #[test]
    fn indexable_text_repeats_by_importance() {
        let mut tool = tool_with_schema(serde_json::json!({}));
        tool.description = "short".into();
        tool.metadata.importance = 8; // weight = 3
        let text = indexable_text(&tool);
        assert_eq!(text.matches(&tool.name).count(), 1 + 3); // base + repeats
    }
}
