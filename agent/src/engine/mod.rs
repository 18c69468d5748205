//! Agent Turn Engine (spec.md §4.5): the top-level turn driver. Initializes
//! the turn, resolves pending tool calls left over from the previous turn,
//! hands off to an active workflow if present, otherwise runs the bounded
//! general LLM<->tool loop, and finalizes session state.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::Value;

use crate::events::{EventSink, ToolResultEvent};
use crate::history;
use crate::pipeline;
use crate::selector::{self, cache::EmbeddingCache, cache::EmbeddingProvider};
use crate::session::{SessionState, WorkflowStatus};
use crate::stream;
use crate::traits::{LlmTransport, ToolExecutor, WorkflowHandler, WorkflowOutcome};
use crate::types::{InteractionStatus, Message, MessageType, Role, ToolCallRequest, ToolDefinition};

use turnkit_core::config::{EngineConfig, ToolSelectorConfig};

/// Known workflow type the engine recognizes for handoff (spec.md §4.5
/// "Workflow", GLOSSARY). The workflow's own state machine is out of scope;
/// this crate only needs its type tag to find an active instance.
pub const STORY_BUILDER_WORKFLOW_TYPE: &str = "story_builder";
/// Tool name the model invokes to kick off the Story Builder workflow
/// (spec.md §4.5 General loop step 8 "Workflow trigger detection").
pub const STORY_TRIGGER_TOOL: &str = "trigger-story-builder";

/// The external collaborators and tuning knobs a turn is run against. Bundled
/// so `run_turn`'s signature stays readable (spec.md §9 "Cross-component
/// references": these are all abstract capabilities plugged in by the caller).
pub struct EngineDeps<'a> {
    pub catalog: &'a [ToolDefinition],
    pub llm: &'a dyn LlmTransport,
    pub executor: &'a dyn ToolExecutor,
    pub workflow: Option<&'a dyn WorkflowHandler>,
    pub cfg: &'a EngineConfig,
    pub selector_cfg: &'a ToolSelectorConfig,
    pub selector_cache: Option<&'a EmbeddingCache>,
    pub embedder: Option<&'a dyn EmbeddingProvider>,
    pub system_prompt: &'a str,
}

/// An in-flight signal that unwinds the general loop outright rather than
/// finalizing with an ordinary status (spec.md §4.5 "Catch-alls").
enum EngineSignal {
    Unexpected(String),
}

/// Run one full turn: `Init -> ResolvePending -> (Workflow | General) -> Finalize`.
pub async fn run_turn(
    session: &mut SessionState,
    user_message: &str,
    deps: &EngineDeps<'_>,
    sink: &mut dyn EventSink,
) -> InteractionStatus {
    let start = Instant::now();
    init(session, deps.system_prompt);
    let ts = session.next_timestamp();
    session.messages.push(Message::user(user_message, ts));
    sink.status("turn started");

    let status = match run_turn_inner(user_message, session, deps, sink).await {
        Ok(status) => status,
        Err(EngineSignal::Unexpected(msg)) => {
            tracing::error!(error = %msg, "unexpected agent error");
            let ts = session.next_timestamp();
            session.messages.push(Message::assistant(
                "I encountered an unexpected error while processing your request.",
                ts,
            ));
            sink.error("an unexpected error occurred");
            InteractionStatus::UnexpectedAgentError
        }
    };

    session.last_interaction_status = status;
    session.is_streaming = false;
    session
        .session_stats
        .turn_durations_ms
        .push(start.elapsed().as_millis() as u64);
    sink.completed(status);
    status
}

async fn run_turn_inner(
    query: &str,
    session: &mut SessionState,
    deps: &EngineDeps<'_>,
    sink: &mut dyn EventSink,
) -> Result<InteractionStatus, EngineSignal> {
    // ResolvePending.
    let pending = pending_calls(session);
    if !pending.is_empty() {
        sink.status("resolving pending tool calls from the previous turn");
        let outcome = pipeline::execute(&pending, session, deps.catalog, deps.executor, deps.cfg).await;
        session.messages.extend(outcome.tool_messages.iter().cloned());
        session.messages.extend(outcome.internal_messages.iter().cloned());
        sink.tool_results(to_tool_result_events(&outcome.tool_messages));
        if outcome.critical {
            sink.error("a pending tool call failed critically");
            return Ok(InteractionStatus::ToolError);
        }
    }

    // Workflow.
    if let Some(handler) = deps.workflow {
        if session
            .active_workflow_of_type(STORY_BUILDER_WORKFLOW_TYPE)
            .is_some()
        {
            match handler.delegate(session, sink).await {
                Ok(WorkflowOutcome::Handled) => {
                    if session.last_interaction_status.is_turn_terminal() {
                        return Ok(session.last_interaction_status);
                    }
                }
                Ok(WorkflowOutcome::FallThrough) => {}
                Err(e) => return Err(EngineSignal::Unexpected(e.to_string())),
            }
        }
    }

    general_loop(query, session, deps, sink).await
}

async fn general_loop(
    query: &str,
    session: &mut SessionState,
    deps: &EngineDeps<'_>,
    sink: &mut dyn EventSink,
) -> Result<InteractionStatus, EngineSignal> {
    let mut tool_ok_prev = false;
    let mut accumulated_text = String::new();

    for cycle in 0..deps.cfg.max_tool_cycles_outer {
        let is_initial = cycle == 0;
        let mut provide_tools = !tool_ok_prev;
        if is_initial && selector::rules::is_bare_greeting(query) {
            provide_tools = false;
        }

        let mut shortlist = if provide_tools {
            selector::select(
                query,
                &session.current_user,
                deps.catalog,
                deps.selector_cfg.max_tools,
                deps.selector_cfg,
                deps.selector_cache,
                deps.embedder,
            )
            .await
        } else {
            Vec::new()
        };

        if is_initial && workflow_trigger_hint(query) {
            if let Some(trigger) = deps.catalog.iter().find(|t| t.name == STORY_TRIGGER_TOOL) {
                if !shortlist.iter().any(|t| t.name == trigger.name) {
                    shortlist.push(trigger.clone());
                }
            }
        }

        sink.status(&format!(
            "cycle {} of {}",
            cycle + 1,
            deps.cfg.max_tool_cycles_outer
        ));

        let outcome = match run_llm_cycle(session, &shortlist, query, deps, sink, tool_ok_prev).await {
            CycleOutcome::Stream(outcome) => outcome,
            CycleOutcome::Critical => {
                let ts = session.next_timestamp();
                session.messages.push(Message::assistant(
                    "I ran into a problem with the conversation history and can't continue this turn.",
                    ts,
                ));
                return Ok(InteractionStatus::CriticalHistoryError);
            }
            CycleOutcome::Failed(err_msg) => return Ok(handle_llm_failure(session, sink, &err_msg)),
        };

        if outcome.text.is_empty() && outcome.tool_calls.is_empty() {
            if is_initial {
                let ts = session.next_timestamp();
                session.messages.push(Message::internal(
                    Role::Assistant,
                    "[LLM returned no response]",
                    MessageType::Other("empty_response".to_string()),
                    ts,
                ));
            }
            return Ok(InteractionStatus::CompletedEmpty);
        }

        if !outcome.tool_calls.is_empty() {
            let assistant_text = if outcome.text.is_empty() {
                "Okay, I need to use some tools.".to_string()
            } else {
                outcome.text.clone()
            };
            let ts = session.next_timestamp();
            session.messages.push(Message::assistant_with_tool_calls(
                assistant_text,
                outcome.tool_calls.clone(),
                ts,
            ));

            let batch_outcome =
                pipeline::execute(&outcome.tool_calls, session, deps.catalog, deps.executor, deps.cfg)
                    .await;
            session.messages.extend(batch_outcome.tool_messages.iter().cloned());
            session.messages.extend(batch_outcome.internal_messages.iter().cloned());
            sink.tool_results(to_tool_result_events(&batch_outcome.tool_messages));

            if batch_outcome.critical {
                return Ok(InteractionStatus::ToolError);
            }

            if is_initial
                && outcome.tool_calls.len() == 1
                && outcome.tool_calls[0].name == STORY_TRIGGER_TOOL
            {
                if let Some(status) =
                    check_workflow_created(session, deps, sink, &batch_outcome.tool_messages).await?
                {
                    return Ok(status);
                }
            }

            tool_ok_prev = !batch_outcome.tool_messages.iter().any(|m| m.is_error);
            accumulated_text = outcome.text;
            continue;
        }

        // Text only.
        let already_appended = session
            .messages
            .last()
            .map_or(false, |m| m.content == outcome.text);
        if !already_appended {
            let ts = session.next_timestamp();
            session.messages.push(Message::assistant(outcome.text.clone(), ts));
        }
        let status = if session.last_interaction_status == InteractionStatus::ToolError {
            InteractionStatus::ToolError
        } else {
            InteractionStatus::CompletedOk
        };
        sink.status("turn completed");
        return Ok(status);
    }

    let ts = session.next_timestamp();
    session.messages.push(Message::assistant(
        format!("{accumulated_text}\n\n[Reached the maximum number of processing steps for this turn.]"),
        ts,
    ));
    sink.error("maximum processing steps reached");
    Ok(InteractionStatus::MaxCallsReached)
}

/// Result of running one LLM invocation for a cycle, after any context-overflow
/// retries have been exhausted (spec.md §B.1 "Context-overflow recovery").
enum CycleOutcome {
    Stream(stream::StreamOutcome),
    Critical,
    Failed(String),
}

/// Prepare history, invoke the LLM, and process its stream -- retrying with a
/// truncated tool history when the provider reports a context-overflow error,
/// bounded by `cfg.max_context_overflow_retries` (spec.md §B.1).
async fn run_llm_cycle(
    session: &mut SessionState,
    shortlist: &[ToolDefinition],
    query: &str,
    deps: &EngineDeps<'_>,
    sink: &mut dyn EventSink,
    had_pending_tool_results: bool,
) -> CycleOutcome {
    let mut overflow_attempts = 0usize;
    loop {
        let scratchpad: Vec<_> = session.scratchpad.iter().cloned().collect();
        let prepared = history::prepare(&session.messages, deps.cfg.max_history_messages, &scratchpad);
        if prepared.critical {
            return CycleOutcome::Critical;
        }

        let stream = match deps
            .llm
            .generate_content_stream(&prepared.turns, shortlist, query, session)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                let err_msg = e.to_string();
                if history::overflow::is_context_overflow_error(&err_msg)
                    && overflow_attempts < deps.cfg.max_context_overflow_retries
                {
                    overflow_attempts += 1;
                    retry_with_truncated_history(session, sink, overflow_attempts, deps.cfg.tool_result_recovery_max_chars);
                    continue;
                }
                return CycleOutcome::Failed(err_msg);
            }
        };

        let outcome = stream::process(stream, session, sink, deps.cfg, had_pending_tool_results).await;

        if let Some(err) = &outcome.error {
            if history::overflow::is_context_overflow_error(err)
                && overflow_attempts < deps.cfg.max_context_overflow_retries
            {
                overflow_attempts += 1;
                retry_with_truncated_history(session, sink, overflow_attempts, deps.cfg.tool_result_recovery_max_chars);
                continue;
            }
            return CycleOutcome::Failed(err.clone());
        }

        return CycleOutcome::Stream(outcome);
    }
}

fn retry_with_truncated_history(
    session: &mut SessionState,
    sink: &mut dyn EventSink,
    attempt: usize,
    max_chars: usize,
) {
    let truncated = history::overflow::truncate_tool_messages_in_place(&mut session.messages, max_chars);
    tracing::warn!(attempt, truncated, "context overflow reported by llm transport; retrying with truncated tool history");
    sink.status("conversation exceeded the model's context window; retrying with a trimmed history");
}

fn handle_llm_failure(session: &mut SessionState, sink: &mut dyn EventSink, err_msg: &str) -> InteractionStatus {
    if history::reset::is_reset_trigger(err_msg) {
        let ts = session.next_timestamp();
        session.reset_history(Message::assistant(
            "I had to reset our conversation history due to an internal inconsistency. \
             Please continue -- some earlier context may be lost.",
            ts,
        ));
        sink.error("conversation history was reset due to a provider-reported inconsistency");
        return InteractionStatus::HistoryResetRequired;
    }

    tracing::error!(error = %err_msg, "llm call failed");
    let ts = session.next_timestamp();
    session.messages.push(Message::internal(
        Role::Assistant,
        "I encountered an issue trying to generate a response. Please try again.",
        MessageType::Other("llm_error".to_string()),
        ts,
    ));
    InteractionStatus::LlmFailure
}

/// Parse a successful workflow-creation trigger result and, if the workflow
/// really exists, delegate the rest of the turn to it (spec.md §4.5 General
/// loop step 8 "Workflow trigger detection").
async fn check_workflow_created(
    session: &mut SessionState,
    deps: &EngineDeps<'_>,
    sink: &mut dyn EventSink,
    tool_messages: &[Message],
) -> Result<Option<InteractionStatus>, EngineSignal> {
    let Some(first) = tool_messages.first() else {
        return Ok(None);
    };
    if first.is_error {
        return Ok(None);
    }
    let Some(workflow_id) = parse_workflow_created(&first.content) else {
        return Ok(None);
    };
    if !session.active_workflows.contains_key(&workflow_id) {
        tracing::warn!(
            workflow_id,
            "workflow trigger reported success but no matching active workflow was registered"
        );
        return Ok(None);
    }
    let Some(handler) = deps.workflow else {
        return Ok(None);
    };

    match handler.delegate(session, sink).await {
        Ok(_) => {
            let status = session.last_interaction_status;
            if !status.is_turn_terminal() {
                return Ok(None);
            }
            if let Some(mut ctx) = session.active_workflows.remove(&workflow_id) {
                ctx.status = match status {
                    InteractionStatus::WorkflowCompleted => WorkflowStatus::Completed,
                    _ => WorkflowStatus::Failed,
                };
                session.completed_workflows.push(ctx);
            }
            Ok(Some(status))
        }
        Err(e) => Err(EngineSignal::Unexpected(e.to_string())),
    }
}

fn parse_workflow_created(content: &str) -> Option<String> {
    let v: Value = serde_json::from_str(content).ok()?;
    if v.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }
    v.get("workflow_id").and_then(Value::as_str).map(str::to_string)
}

fn workflow_trigger_hint(query: &str) -> bool {
    const PHRASES: &[&str] = &[
        "create a story",
        "new story",
        "create a ticket",
        "file a ticket",
        "start a workflow",
        "create an issue",
    ];
    let q = query.to_lowercase();
    PHRASES.iter().any(|p| q.contains(p))
}

fn init(session: &mut SessionState, system_prompt: &str) {
    session.current_step_error = None;
    session.last_interaction_status = InteractionStatus::Processing;
    session.streaming_placeholder_content.clear();
    session.is_streaming = true;
    ensure_system_prompt(session, system_prompt);
}

fn ensure_system_prompt(session: &mut SessionState, system_prompt: &str) {
    match session.messages.first() {
        Some(m) if m.role == Role::System => {
            if m.content != system_prompt {
                let ts = session.next_timestamp();
                session.messages[0] = Message::system(system_prompt, ts);
            }
        }
        _ => {
            let ts = session.next_timestamp();
            session.messages.insert(0, Message::system(system_prompt, ts));
        }
    }
}

/// Scan from the end for the last assistant message with tool calls, and
/// return those not yet answered by a subsequent tool message (spec.md §4.5
/// "ResolvePending", GLOSSARY "Pending tool call").
fn pending_calls(session: &SessionState) -> Vec<ToolCallRequest> {
    let Some(idx) = session
        .messages
        .iter()
        .rposition(|m| m.role == Role::Assistant && m.has_tool_calls())
    else {
        return Vec::new();
    };
    let calls = session.messages[idx].tool_calls.clone().unwrap_or_default();
    let answered: HashSet<&str> = session.messages[idx + 1..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    calls
        .into_iter()
        .filter(|c| !answered.contains(c.id.as_str()))
        .collect()
}

fn to_tool_result_events(messages: &[Message]) -> Vec<ToolResultEvent> {
    messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| ToolResultEvent {
            tool_call_id: m.tool_call_id.clone().unwrap_or_default(),
            name: m.name.clone().unwrap_or_default(),
            content: m.content.clone(),
            is_error: m.is_error,
        })
        .collect()
}
