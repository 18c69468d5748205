//! External collaborators (spec.md §6, §9): the LLM transport, the tool
//! executor, and the workflow handler are all expressed as small trait
//! objects the caller plugs in at session construction. None of their
//! concrete implementations are this crate's concern.

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_core::Stream;
use serde_json::{Map, Value};

use crate::events::EventSink;
use crate::session::SessionState;
use crate::types::ToolDefinition;

/// One streamed fragment of a provider response (spec.md §6 `Chunk`/`Part`).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub parts: Vec<Part>,
    pub usage_metadata: Option<UsageMetadata>,
}

/// A provider response fragment. Providers disagree on whether function-call
/// arguments arrive as a single map or a list of maps as they stream in
/// (spec.md §9 "Duck-typed provider chunks") — modeled here as a tagged
/// variant rather than forcing callers to guess.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    FunctionCall { name: String, args: FunctionCallArgs },
}

#[derive(Debug, Clone)]
pub enum FunctionCallArgs {
    Map(Map<String, Value>),
    List(Vec<Map<String, Value>>),
    Null,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageMetadata {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    pub total_token_count: u64,
}

/// A provider-formatted turn, as emitted by the history preparer and
/// consumed by [`LlmTransport`] (spec.md §4.2 step 4).
#[derive(Debug, Clone)]
pub struct ProviderTurn {
    pub role: ProviderRole,
    pub parts: Vec<ProviderPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    User,
    Model,
    Tool,
}

#[derive(Debug, Clone)]
pub enum ProviderPart {
    Text(String),
    FunctionCall {
        id: String,
        name: String,
        args: Map<String, Value>,
    },
    FunctionResponse {
        id: String,
        name: String,
        response: Value,
    },
}

/// The LLM transport: opens a streaming generative call. Deliberately out of
/// scope for this crate beyond this interface (spec.md §1, §6).
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn generate_content_stream(
        &self,
        history: &[ProviderTurn],
        tools: &[ToolDefinition],
        query: &str,
        session: &SessionState,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Chunk>> + Send>>>;
}

/// Outcome of a single tool invocation, duck-typed over the shapes a real
/// executor can hand back (spec.md §6 "Tool executor interface").
#[derive(Debug, Clone)]
pub enum ToolExecValue {
    Map(Map<String, Value>),
    List(Vec<Value>),
    Primitive(Value),
    /// Signaled by the executor when the user lacks the permission the tool
    /// requires (spec.md §4.3 step 7, §7 `PermissionDenied`).
    PermissionDenied { message: String },
}

impl ToolExecValue {
    pub fn is_critical(&self) -> bool {
        match self {
            ToolExecValue::Map(m) => m.get("is_critical").and_then(Value::as_bool).unwrap_or(false),
            _ => false,
        }
    }

    /// An error-status payload per spec.md §4.3 step 7: a map with a
    /// non-null `error`, or `status == "ERROR"`.
    pub fn is_error_payload(&self) -> bool {
        match self {
            ToolExecValue::Map(m) => {
                m.get("error").map_or(false, |v| !v.is_null())
                    || m.get("status").and_then(Value::as_str) == Some("ERROR")
            }
            _ => false,
        }
    }

    pub fn execution_time_ms(&self) -> Option<u64> {
        match self {
            ToolExecValue::Map(m) => m.get("execution_time_ms").and_then(Value::as_u64),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ToolExecValue::Map(m) => Value::Object(m.clone()),
            ToolExecValue::List(l) => Value::Array(l.clone()),
            ToolExecValue::Primitive(v) => v.clone(),
            ToolExecValue::PermissionDenied { message } => {
                serde_json::json!({ "status": "PERMISSION_DENIED", "message": message })
            }
        }
    }
}

/// The tool executor: invokes concrete tool implementations and auth
/// (spec.md §6 "Tool executor interface").
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(
        &self,
        name: &str,
        args: &Map<String, Value>,
        session: &SessionState,
    ) -> Result<ToolExecValue>;

    async fn get_available_tool_definitions(&self) -> Vec<ToolDefinition>;
}

/// Outcome of delegating a turn to an active workflow (spec.md §4.5 "Workflow").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// The workflow consumed the turn; `last_interaction_status` on the
    /// session already reflects the terminal state.
    Handled,
    /// The workflow declined or had nothing to do; caller should fall
    /// through to the general LLM<->tool loop.
    FallThrough,
}

/// The workflow handler: a longer multi-turn state machine external to the
/// engine (spec.md §1, §9). Only the handoff contract is specified here —
/// the workflow's own logic (e.g. Story Builder) is out of scope.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn delegate(
        &self,
        session: &mut SessionState,
        event_sink: &mut dyn EventSink,
    ) -> Result<WorkflowOutcome>;
}
