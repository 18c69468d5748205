//! LLM Stream Processor (spec.md §4.4): consumes the provider's streaming
//! response, assembling text deltas and fragmented tool calls, capturing
//! usage metadata, and isolating faults so a single bad chunk never aborts
//! the turn.

pub mod assemble;
pub mod synthesis;

use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;

use turnkit_core::config::EngineConfig;

use crate::events::EventSink;
use crate::session::SessionState;
use crate::traits::{Chunk, Part, UsageMetadata};
use crate::types::ToolCallRequest;
use assemble::CallAssembler;

/// What a call of [`process`] produced, handed back to the engine to decide
/// the next cycle (spec.md §4.5 General loop step 5-8).
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<UsageMetadata>,
    /// Set when the provider stream itself raised; the engine classifies
    /// this (spec.md §4.5 step 6, §4.2 "Reset signal").
    pub error: Option<String>,
}

/// Drive one provider stream to completion (or fault), threading text and
/// status events to `sink` as they arrive.
///
/// `had_pending_tool_results` feeds the result-synthesis heuristic (spec.md
/// §4.4 "Result synthesis (optional)"): true when the prior cycle in this
/// turn executed tools.
pub async fn process(
    mut stream: Pin<Box<dyn Stream<Item = anyhow::Result<Chunk>> + Send>>,
    session: &mut SessionState,
    sink: &mut dyn EventSink,
    cfg: &EngineConfig,
    had_pending_tool_results: bool,
) -> StreamOutcome {
    let mut assembler = CallAssembler::new();
    let mut text = String::new();
    let mut usage: Option<UsageMetadata> = None;
    let mut stream_error: Option<String> = None;

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!(error = %e, "llm stream raised a fatal error");
                stream_error = Some(e.to_string());
                break;
            }
        };

        for part in chunk.parts {
            match part {
                Part::Text(delta) => {
                    if !delta.is_empty() {
                        session.streaming_placeholder_content.push_str(&delta);
                        text.push_str(&delta);
                        sink.text_chunk(&delta);
                    }
                }
                Part::FunctionCall { name, args } => {
                    if name.trim().is_empty() {
                        tracing::warn!("dropped function-call chunk with missing name");
                        sink.status("received a malformed tool-call fragment; skipping");
                        continue;
                    }
                    assembler.merge(name, args);
                }
            }
        }
        if let Some(u) = chunk.usage_metadata {
            usage = Some(u);
        }
    }

    let tool_calls = finalize(assembler);

    if stream_error.is_none() {
        if let Some(block) = synthesis::maybe_synthesize(
            &text,
            had_pending_tool_results,
            &session.scratchpad,
            cfg.result_synthesis_enabled,
        ) {
            session.streaming_placeholder_content.push_str(&block);
            text.push_str(&block);
            sink.text_chunk(&block);
        }
    }

    if !tool_calls.is_empty() {
        sink.tool_calls(tool_calls.clone());
    }

    if let Some(err) = &stream_error {
        sink.error(&format!("I encountered an issue while generating a response: {err}"));
        sink.text_chunk("I encountered an issue trying to generate a response. Please try again.");
    }

    StreamOutcome {
        text,
        tool_calls,
        usage,
        error: stream_error,
    }
}

fn finalize(assembler: CallAssembler) -> Vec<ToolCallRequest> {
    assembler
        .into_calls()
        .into_iter()
        .map(|call| {
            let arguments = serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
            ToolCallRequest {
                id: mint_call_id(&call.name),
                name: call.name,
                arguments,
            }
        })
        .collect()
}

fn mint_call_id(name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{name}_{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FunctionCallArgs;
    use crate::types::UserContext;
    use crate::events::RecordingEventSink;
    use futures_util::stream;
    use serde_json::{Map, Value};

    fn chunk_text(s: &str) -> anyhow::Result<Chunk> {
        Ok(Chunk {
            parts: vec![Part::Text(s.to_string())],
            usage_metadata: None,
        })
    }

    fn chunk_call(name: &str, key: &str, value: &str) -> anyhow::Result<Chunk> {
        let mut m = Map::new();
        m.insert(key.to_string(), Value::String(value.to_string()));
        Ok(Chunk {
            parts: vec![Part::FunctionCall {
                name: name.to_string(),
                args: FunctionCallArgs::Map(m),
            }],
            usage_metadata: None,
        })
    }

    #[tokio::test]
    async fn text_only_stream_accumulates_and_emits_chunks() {
        let chunks = vec![chunk_text("Hello"), chunk_text(", world")];
        let boxed: Pin<Box<dyn Stream<Item = anyhow::Result<Chunk>> + Send>> =
            Box::pin(stream::iter(chunks));
        let mut session = SessionState::new(UserContext::default());
        let mut sink = RecordingEventSink::new();
        let cfg = EngineConfig::default();
        let outcome = process(boxed, &mut session, &mut sink, &cfg, false).await;
        assert_eq!(outcome.text, "Hello, world");
        assert!(outcome.tool_calls.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn assembles_tool_call_and_mints_an_id() {
        let chunks = vec![chunk_call("repo-list", "org", "acme")];
        let boxed: Pin<Box<dyn Stream<Item = anyhow::Result<Chunk>> + Send>> =
            Box::pin(stream::iter(chunks));
        let mut session = SessionState::new(UserContext::default());
        let mut sink = RecordingEventSink::new();
        let cfg = EngineConfig::default();
        let outcome = process(boxed, &mut session, &mut sink, &cfg, false).await;
        assert_eq!(outcome.tool_calls.len(), 1);
        assert!(outcome.tool_calls[0].id.starts_with("call_repo-list_"));
        assert!(outcome.tool_calls[0].arguments.contains("acme"));
    }

    #[tokio::test]
    async fn stream_error_is_reported_and_framed_for_the_user() {
        let chunks: Vec<anyhow::Result<Chunk>> = vec![
            chunk_text("partial"),
            Err(anyhow::anyhow!("connection reset")),
        ];
        let boxed: Pin<Box<dyn Stream<Item = anyhow::Result<Chunk>> + Send>> =
            Box::pin(stream::iter(chunks));
        let mut session = SessionState::new(UserContext::default());
        let mut sink = RecordingEventSink::new();
        let cfg = EngineConfig::default();
        let outcome = process(boxed, &mut session, &mut sink, &cfg, false).await;
        assert!(outcome.error.is_some());
        assert!(sink.events.iter().any(|e| matches!(e, crate::events::AgentEvent::Error(_))));
    }
}
