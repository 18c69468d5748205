//! Tool Pipeline (spec.md §4.3): validates, executes, and retries a batch of
//! tool calls the model requested, updating the scratchpad and session
//! stats as it goes.

pub mod circular;
pub mod summarize;
pub mod truncate;
pub mod validate;

use std::time::Duration;

use serde_json::{Map, Value};
use turnkit_core::config::EngineConfig;
use turnkit_core::strutil::redact_for_log;

use crate::session::{PreviousToolCall, SessionState};
use crate::traits::{ToolExecValue, ToolExecutor};
use crate::types::{Message, MessageType, Role, ScratchpadEntry, ToolCallRequest, ToolDefinition};

/// Result of running a batch through the pipeline (spec.md §4.3 contract).
pub struct PipelineOutcome {
    pub tool_messages: Vec<Message>,
    pub internal_messages: Vec<Message>,
    pub critical: bool,
}

/// `execute(calls, user, session, catalog) -> (toolMessages, internalMessages, criticalError, updatedPrevCalls)`.
///
/// `previous_tool_calls` is updated on `session` directly rather than
/// returned separately, since `SessionState` already owns it.
///
/// Dispatch (spec.md §4.3 "Dispatch", §9 "Dynamic dispatch") is a
/// batch-level decision: if any call's name has no underscore, the whole
/// batch is delegated to the adapter path rather than deciding per call.
pub async fn execute(
    calls: &[ToolCallRequest],
    session: &mut SessionState,
    catalog: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    cfg: &EngineConfig,
) -> PipelineOutcome {
    if calls.iter().any(|c| is_adapter_tool(&c.name)) {
        execute_adapter_batch(calls, session, catalog, executor, cfg).await
    } else {
        execute_standard_batch(calls, session, catalog, executor, cfg).await
    }
}

/// Service-level tool names carry no underscore (spec.md §4.3 "Dispatch").
fn is_adapter_tool(name: &str) -> bool {
    !name.contains('_')
}

/// The standard path: circular detection then the validate/execute
/// sequence, call by call, breaking the batch on a critical failure.
async fn execute_standard_batch(
    calls: &[ToolCallRequest],
    session: &mut SessionState,
    catalog: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    cfg: &EngineConfig,
) -> PipelineOutcome {
    let mut tool_messages = Vec::new();
    let mut internal_messages = Vec::new();
    let mut critical = false;

    for call in calls {
        if critical {
            break; // step 11: critical break
        }
        if is_circular(call, session) {
            reject_circular(session, &mut tool_messages, &mut internal_messages, call);
            continue;
        }
        critical |= run_call(
            call,
            session,
            catalog,
            executor,
            cfg,
            &mut tool_messages,
            &mut internal_messages,
        )
        .await;
    }

    PipelineOutcome {
        tool_messages,
        internal_messages,
        critical,
    }
}

/// The adapter path (spec.md §4.3 "Dispatch", §9 "Dynamic dispatch"):
/// circular detection runs for the whole batch up front rather than being
/// interleaved per call, and only the survivors reach the executor. Returns
/// the same tuple shape as the standard path.
async fn execute_adapter_batch(
    calls: &[ToolCallRequest],
    session: &mut SessionState,
    catalog: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    cfg: &EngineConfig,
) -> PipelineOutcome {
    let mut tool_messages = Vec::new();
    let mut internal_messages = Vec::new();
    let mut critical = false;
    let mut survivors = Vec::with_capacity(calls.len());

    for call in calls {
        if is_circular(call, session) {
            reject_circular(session, &mut tool_messages, &mut internal_messages, call);
        } else {
            survivors.push(call);
        }
    }

    for call in survivors {
        if critical {
            break;
        }
        critical |= run_call(
            call,
            session,
            catalog,
            executor,
            cfg,
            &mut tool_messages,
            &mut internal_messages,
        )
        .await;
    }

    PipelineOutcome {
        tool_messages,
        internal_messages,
        critical,
    }
}

fn is_circular(call: &ToolCallRequest, session: &SessionState) -> bool {
    matches!(
        circular::check(&call.name, &call.arguments, &session.previous_tool_calls),
        circular::CircularVerdict::Circular
    )
}

fn reject_circular(
    session: &mut SessionState,
    tool_messages: &mut Vec<Message>,
    internal_messages: &mut Vec<Message>,
    call: &ToolCallRequest,
) {
    emit_error(
        session,
        tool_messages,
        internal_messages,
        call,
        "CircularToolCallDetected",
        "This action has already been attempted too many times in a row.",
    );
}

/// Malformed-check, deserialization, parameter injection, catalog lookup,
/// validation, and execution-with-retry for one call (spec.md §4.3 steps
/// 1-3 and 5-8). Circular detection (step 4) is the caller's responsibility,
/// since the standard and adapter paths order it differently. Returns
/// whether the failure was critical.
async fn run_call(
    call: &ToolCallRequest,
    session: &mut SessionState,
    catalog: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    cfg: &EngineConfig,
    tool_messages: &mut Vec<Message>,
    internal_messages: &mut Vec<Message>,
) -> bool {
    // Step 1: malformed check.
    if call.name.trim().is_empty() {
        emit_error(
            session,
            tool_messages,
            internal_messages,
            call,
            "MalformedToolCall",
            "The requested tool call was missing a name.",
        );
        return false;
    }

    // Step 2: argument deserialization.
    let mut args = deserialize_args(&call.arguments);

    // Step 3: parameter injection.
    if call.name == "user-issues" && !args.contains_key("user_email") {
        if let Some(email) = &session.current_user.email {
            args.insert("user_email".to_string(), Value::String(email.clone()));
        }
    }

    let Some(tool_def) = catalog.iter().find(|t| t.name == call.name) else {
        emit_error(
            session,
            tool_messages,
            internal_messages,
            call,
            "ToolExecutorConfigurationError",
            "The requested tool is not available.",
        );
        return false;
    };

    // Step 5: validation + coercion.
    let validated = match validate::validate_and_coerce(tool_def, args) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "tool parameter validation failed");
            emit_error(
                session,
                tool_messages,
                internal_messages,
                call,
                "ToolParameterValidationError",
                &e.to_string(),
            );
            return false;
        }
    };

    // Step 6: execution with bounded retry.
    let outcome = execute_with_retry(executor, &call.name, &validated, session, cfg).await;

    // Step 8 (partial): record the call regardless of outcome shape,
    // now that it has actually reached the executor.
    let args_json = serde_json::to_string(&validated).unwrap_or_default();
    session.push_previous_tool_call(PreviousToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arg_hash: circular::arg_hash(&call.name, &args_json),
        arguments: args_json,
    });

    match outcome {
        Ok(value) => {
            if let ToolExecValue::PermissionDenied { message } = &value {
                tool_messages.push(Message::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    value.to_json().to_string(),
                    true,
                    session.next_timestamp(),
                ));
                internal_messages.push(Message::assistant(
                    format!(
                        "Sorry, you don't have permission to use '{}' for this action.",
                        call.name
                    ),
                    session.next_timestamp(),
                ));
                session.session_stats.record_tool_call(&call.name, true);
                let _ = message;
                return false;
            }

            if value.is_error_payload() {
                tracing::warn!(tool = %call.name, "tool returned an error-status payload");
                tool_messages.push(Message::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    truncate::truncate_if_oversized(
                        value.to_json().to_string(),
                        cfg.tool_result_max_chars,
                    ),
                    true,
                    session.next_timestamp(),
                ));
                session.session_stats.record_tool_call(&call.name, true);
                return value.is_critical();
            }

            // Success.
            let serialized = truncate::truncate_if_oversized(
                value.to_json().to_string(),
                cfg.tool_result_max_chars,
            );
            tracing::info!(
                tool = %call.name,
                preview = %redact_for_log(&serialized),
                "tool call succeeded"
            );
            tool_messages.push(Message::tool_result(
                call.id.clone(),
                call.name.clone(),
                serialized,
                false,
                session.next_timestamp(),
            ));
            session.session_stats.record_tool_call(&call.name, false);

            session.push_scratchpad(ScratchpadEntry {
                tool_name: call.name.clone(),
                tool_input: serde_json::to_string(&validated).unwrap_or_default(),
                result: value.to_json().to_string(),
                is_error: false,
                summary: summarize::summarize(&value.to_json()),
                timestamp: session.next_timestamp(),
            });
            false
        }
        Err(e) => {
            tracing::error!(tool = %call.name, error = %e, "tool execution failed after retries");
            emit_error(
                session,
                tool_messages,
                internal_messages,
                call,
                "ToolExecutionExceptionAfterRetries",
                "The tool failed after repeated attempts.",
            );
            session.session_stats.record_tool_call(&call.name, true);
            cfg.break_on_critical_tool_error
        }
    }
}

async fn execute_with_retry(
    executor: &dyn ToolExecutor,
    name: &str,
    args: &Map<String, Value>,
    session: &SessionState,
    cfg: &EngineConfig,
) -> anyhow::Result<ToolExecValue> {
    let mut attempt = 0usize;
    loop {
        match executor.execute_tool(name, args, session).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= cfg.max_tool_execution_retries {
                    return Err(e);
                }
                let delay = (cfg.tool_retry_initial_delay_secs * 2f64.powi(attempt as i32 - 1))
                    .min(cfg.max_retry_delay_secs);
                tracing::warn!(tool = name, attempt, delay_secs = delay, error = %e, "retrying tool call");
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            }
        }
    }
}

fn deserialize_args(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(m)) => m,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            let mut m = Map::new();
            m.insert("value".to_string(), other);
            m
        }
        Err(e) => {
            let mut m = Map::new();
            m.insert(
                "__tool_arg_error__".to_string(),
                Value::String("JSONDecodeError".to_string()),
            );
            m.insert("message".to_string(), Value::String(e.to_string()));
            m.insert("raw_arguments".to_string(), Value::String(raw.to_string()));
            m
        }
    }
}

fn emit_error(
    session: &mut SessionState,
    tool_messages: &mut Vec<Message>,
    internal_messages: &mut Vec<Message>,
    call: &ToolCallRequest,
    kind: &str,
    detail: &str,
) {
    let content = serde_json::json!({ "error": kind, "message": detail }).to_string();
    tool_messages.push(Message::tool_result(
        call.id.clone(),
        call.name.clone(),
        content,
        true,
        session.next_timestamp(),
    ));
    internal_messages.push(Message::internal(
        Role::Assistant,
        format!("{kind}: {detail}"),
        MessageType::Other(kind.to_string()),
        session.next_timestamp(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolMetadata, UserContext};
    use anyhow::Result;
    use async_trait::async_trait;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute_tool(
            &self,
            name: &str,
            args: &Map<String, Value>,
            _session: &SessionState,
        ) -> Result<ToolExecValue> {
            if name == "failing-tool" {
                anyhow::bail!("simulated transient failure");
            }
            if name == "denied-tool" {
                return Ok(ToolExecValue::PermissionDenied {
                    message: "No JIRA_READ".to_string(),
                });
            }
            let mut m = Map::new();
            m.insert("echo".to_string(), Value::Object(args.clone()));
            Ok(ToolExecValue::Map(m))
        }

        async fn get_available_tool_definitions(&self) -> Vec<ToolDefinition> {
            Vec::new()
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "d".into(),
            parameters: serde_json::json!({}),
            metadata: ToolMetadata::default(),
        }
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args.to_string(),
        }
    }

    #[tokio::test]
    async fn successful_call_produces_tool_message_and_scratchpad_entry() {
        let mut session = SessionState::new(UserContext::default());
        let catalog = vec![tool("repo-list")];
        let calls = vec![call("c1", "repo-list", "{}")];
        let outcome = execute(&calls, &mut session, &catalog, &EchoExecutor, &EngineConfig::default()).await;
        assert_eq!(outcome.tool_messages.len(), 1);
        assert!(!outcome.tool_messages[0].is_error);
        assert!(!outcome.critical);
        assert_eq!(session.scratchpad.len(), 1);
        assert_eq!(session.previous_tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn permission_denied_appends_apology_without_retry() {
        let mut session = SessionState::new(UserContext::default());
        let catalog = vec![tool("denied-tool")];
        let calls = vec![call("c1", "denied-tool", "{}")];
        let outcome = execute(&calls, &mut session, &catalog, &EchoExecutor, &EngineConfig::default()).await;
        assert!(outcome.tool_messages[0].is_error);
        assert!(outcome.internal_messages.iter().any(|m| m.content.contains("permission")));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_without_executing() {
        let mut session = SessionState::new(UserContext::default());
        let calls = vec![call("c1", "ghost_tool", "{}")];
        let outcome = execute(&calls, &mut session, &[], &EchoExecutor, &EngineConfig::default()).await;
        assert!(outcome.tool_messages[0].is_error);
        assert!(session.previous_tool_calls.is_empty());
    }

    #[tokio::test]
    async fn circular_consecutive_calls_are_blocked_on_the_fourth_attempt() {
        let mut session = SessionState::new(UserContext::default());
        let catalog = vec![tool("repo-list")];
        for _ in 0..3 {
            let calls = vec![call("c", "repo-list", "{}")];
            let outcome =
                execute(&calls, &mut session, &catalog, &EchoExecutor, &EngineConfig::default()).await;
            assert!(!outcome.tool_messages[0].is_error);
        }
        let calls = vec![call("c4", "repo-list", "{}")];
        let outcome = execute(&calls, &mut session, &catalog, &EchoExecutor, &EngineConfig::default()).await;
        assert!(outcome.tool_messages[0].is_error);
    }

    #[tokio::test]
    async fn batch_with_any_adapter_name_routes_whole_batch_through_adapter_path() {
        let mut session = SessionState::new(UserContext::default());
        let catalog = vec![tool("repo-list"), tool("ghost_tool")];
        let calls = vec![
            call("c1", "repo-list", "{}"),
            call("c2", "ghost_tool", "{}"),
        ];
        let outcome = execute(&calls, &mut session, &catalog, &EchoExecutor, &EngineConfig::default()).await;
        assert_eq!(outcome.tool_messages.len(), 2);
        assert!(outcome.tool_messages.iter().all(|m| !m.is_error));
        assert_eq!(session.previous_tool_calls.len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_exhausts_retries_and_reports_error() {
        let mut session = SessionState::new(UserContext::default());
        let catalog = vec![tool("failing-tool")];
        let mut cfg = EngineConfig::default();
        cfg.tool_retry_initial_delay_secs = 0.0;
        cfg.max_retry_delay_secs = 0.0;
        let calls = vec![call("c1", "failing-tool", "{}")];
        let outcome = execute(&calls, &mut session, &catalog, &EchoExecutor, &cfg).await;
        assert!(outcome.tool_messages[0].is_error);
    }
}
