//! Scratchpad summarization (spec.md §4.3 step 9, `_summarize`).

use serde_json::Value;
use turnkit_core::strutil::safe_truncate;

const PREFERRED_KEYS: &[&str] = &[
    "name", "title", "id", "status", "message", "count", "result", "key", "summary", "answer",
];
const MAX_SUMMARY_CHARS: usize = 150;
const MAX_EXTRA_SCALARS: usize = 3;

/// Summarize a tool result for scratchpad storage, bounded to 150 chars.
pub fn summarize(result: &Value) -> String {
    let raw = match result {
        Value::Array(items) => {
            let item_type = items.first().map(value_type_noun).unwrap_or("item");
            format!("Retrieved {} {item_type}s", items.len())
        }
        Value::Object(map) => summarize_object(map),
        other => other.to_string(),
    };
    safe_truncate(&raw, MAX_SUMMARY_CHARS).to_string()
}

fn summarize_object(map: &serde_json::Map<String, Value>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for key in PREFERRED_KEYS {
        if let Some(v) = map.get(*key) {
            parts.push(format!("{key}={}", scalar_preview(v)));
        }
    }

    if parts.is_empty() {
        for (key, value) in map.iter().take(MAX_EXTRA_SCALARS) {
            parts.push(format!("{key}={}", scalar_preview(value)));
        }
    }

    if parts.is_empty() {
        "{}".to_string()
    } else {
        parts.join(", ")
    }
}

fn scalar_preview(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_type_noun(v: &Value) -> &'static str {
    match v {
        Value::Object(_) => "dict",
        Value::Array(_) => "list",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    }
}
