//! Domain-grouped configuration structs, loaded from environment variables
//! with unified fallback logic (spec.md §6 "Configuration").

use super::loader::{env_bool, env_f64, env_optional, env_usize};

/// Top-level engine tuning knobs (spec.md §6).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `MAX_HISTORY_MESSAGES` — history preparer budget.
    pub max_history_messages: usize,
    /// `MAX_TOOL_CYCLES_OUTER` — engine cycle cap.
    pub max_tool_cycles_outer: usize,
    /// `MAX_TOOL_EXECUTION_RETRIES`
    pub max_tool_execution_retries: usize,
    /// `TOOL_RETRY_INITIAL_DELAY` (seconds)
    pub tool_retry_initial_delay_secs: f64,
    /// `MAX_RETRY_DELAY` (seconds)
    pub max_retry_delay_secs: f64,
    /// `MAX_SIMILAR_TOOL_CALLS`
    pub max_similar_tool_calls: usize,
    /// `SIMILARITY_THRESHOLD`
    pub similarity_threshold: f64,
    /// `BREAK_ON_CRITICAL_TOOL_ERROR`
    pub break_on_critical_tool_error: bool,
    /// Max chars kept in a single tool result before truncation (ambient,
    /// §B.2 of SPEC_FULL.md).
    pub tool_result_max_chars: usize,
    /// Max chars kept per tool message during context-overflow recovery.
    pub tool_result_recovery_max_chars: usize,
    /// `MAX_CONTEXT_OVERFLOW_RETRIES` (§B.1 of SPEC_FULL.md)
    pub max_context_overflow_retries: usize,
    /// Whether the stream processor rewrites outgoing text with a
    /// result-synthesis block (spec.md §4.4, §9 open question (c)).
    pub result_synthesis_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history_messages: 30,
            max_tool_cycles_outer: 10,
            max_tool_execution_retries: 3,
            tool_retry_initial_delay_secs: 0.5,
            max_retry_delay_secs: 5.0,
            max_similar_tool_calls: 3,
            similarity_threshold: 0.85,
            break_on_critical_tool_error: false,
            tool_result_max_chars: 12_000,
            tool_result_recovery_max_chars: 3_000,
            max_context_overflow_retries: 3,
            result_synthesis_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_history_messages: env_usize("MAX_HISTORY_MESSAGES", d.max_history_messages),
            max_tool_cycles_outer: env_usize("MAX_TOOL_CYCLES_OUTER", d.max_tool_cycles_outer),
            max_tool_execution_retries: env_usize(
                "MAX_TOOL_EXECUTION_RETRIES",
                d.max_tool_execution_retries,
            ),
            tool_retry_initial_delay_secs: env_f64(
                "TOOL_RETRY_INITIAL_DELAY",
                d.tool_retry_initial_delay_secs,
            ),
            max_retry_delay_secs: env_f64("MAX_RETRY_DELAY", d.max_retry_delay_secs),
            max_similar_tool_calls: env_usize("MAX_SIMILAR_TOOL_CALLS", d.max_similar_tool_calls),
            similarity_threshold: env_f64("SIMILARITY_THRESHOLD", d.similarity_threshold),
            break_on_critical_tool_error: env_bool(
                "BREAK_ON_CRITICAL_TOOL_ERROR",
                &[],
                d.break_on_critical_tool_error,
            ),
            tool_result_max_chars: env_usize("TOOL_RESULT_MAX_CHARS", d.tool_result_max_chars),
            tool_result_recovery_max_chars: env_usize(
                "TOOL_RESULT_RECOVERY_MAX_CHARS",
                d.tool_result_recovery_max_chars,
            ),
            max_context_overflow_retries: env_usize(
                "MAX_CONTEXT_OVERFLOW_RETRIES",
                d.max_context_overflow_retries,
            ),
            result_synthesis_enabled: env_bool(
                "RESULT_SYNTHESIS_ENABLED",
                &[],
                d.result_synthesis_enabled,
            ),
        }
    }
}

/// `TOOL_SELECTOR.*` settings (spec.md §6).
#[derive(Debug, Clone)]
pub struct ToolSelectorConfig {
    pub enabled: bool,
    pub similarity_threshold: f64,
    pub max_tools: usize,
    pub always_include_tools: Vec<String>,
    pub embedding_model: Option<String>,
    pub cache_path: String,
    pub auto_save_interval_seconds: u64,
}

/// Hard cap on the shortlist regardless of `max_tools` (spec.md §4.1 step 9).
pub const SELECTOR_HARD_CAP: usize = 6;

impl Default for ToolSelectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.3,
            max_tools: SELECTOR_HARD_CAP,
            always_include_tools: Vec::new(),
            embedding_model: None,
            cache_path: "data/tool_embeddings.json".to_string(),
            auto_save_interval_seconds: 300,
        }
    }
}

impl ToolSelectorConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let max_tools = env_usize("TOOL_SELECTOR_MAX_TOOLS", d.max_tools).min(SELECTOR_HARD_CAP);
        let always_include_tools = env_optional("TOOL_SELECTOR_ALWAYS_INCLUDE", &[])
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or(d.always_include_tools);
        Self {
            enabled: env_bool("TOOL_SELECTOR_ENABLED", &[], d.enabled),
            similarity_threshold: {
                let v = std::env::var("TOOL_SELECTOR_SIMILARITY_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(d.similarity_threshold);
                v
            },
            max_tools,
            always_include_tools,
            embedding_model: env_optional("TOOL_SELECTOR_EMBEDDING_MODEL", &[]),
            cache_path: env_optional("TOOL_SELECTOR_CACHE_PATH", &[]).unwrap_or(d.cache_path),
            auto_save_interval_seconds: env_usize(
                "TOOL_SELECTOR_AUTO_SAVE_INTERVAL_SECONDS",
                d.auto_save_interval_seconds as usize,
            ) as u64,
        }
    }
}

/// `SCHEMA_OPTIMIZATION.*` settings (spec.md §6).
#[derive(Debug, Clone)]
pub struct SchemaOptimizationConfig {
    pub enabled: bool,
    pub max_description_length: usize,
    pub max_enum_values: usize,
    pub flatten_nested_objects: bool,
    pub simplify_complex_types: bool,
}

impl Default for SchemaOptimizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_description_length: 150,
            max_enum_values: 7,
            flatten_nested_objects: true,
            simplify_complex_types: true,
        }
    }
}

impl SchemaOptimizationConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            enabled: env_bool("SCHEMA_OPTIMIZATION_ENABLED", &[], d.enabled),
            max_description_length: env_usize(
                "SCHEMA_OPTIMIZATION_MAX_DESCRIPTION_LENGTH",
                d.max_description_length,
            ),
            max_enum_values: env_usize("SCHEMA_OPTIMIZATION_MAX_ENUM_VALUES", d.max_enum_values),
            flatten_nested_objects: env_bool(
                "SCHEMA_OPTIMIZATION_FLATTEN_NESTED_OBJECTS",
                &[],
                d.flatten_nested_objects,
            ),
            simplify_complex_types: env_bool(
                "SCHEMA_OPTIMIZATION_SIMPLIFY_COMPLEX_TYPES",
                &[],
                d.simplify_complex_types,
            ),
        }
    }
}
