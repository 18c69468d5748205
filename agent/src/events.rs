//! UI event stream (spec.md §6 "UI event stream (produced)").
//!
//! Ordering guarantees (spec.md §5): `status` prelude -> optional pending-tool
//! `tool_results` -> per cycle: `status` -> interleaved `text_chunk`s ->
//! (`tool_calls` then `tool_results`) | final status -> `completed`.

use serde::{Deserialize, Serialize};

use crate::types::{InteractionStatus, ToolCallRequest};

/// One tool's outcome as reported in a `tool_results` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEvent {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// A typed UI event (spec.md §6 `{type, content}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum AgentEvent {
    TextChunk(String),
    ToolCalls(Vec<ToolCallRequest>),
    ToolResults(Vec<ToolResultEvent>),
    Status(String),
    Error(String),
    Completed { status: InteractionStatus },
}

/// Receives the turn's event stream. Implementors drive a UI transport; this
/// crate treats them as a plain sink, matching the teacher's `EventSink`
/// trait (`skilllite-agent::types::EventSink`) but generalized to the
/// closed event set of spec.md §6.
pub trait EventSink: Send {
    fn emit(&mut self, event: AgentEvent);

    fn text_chunk(&mut self, text: &str) {
        self.emit(AgentEvent::TextChunk(text.to_string()));
    }
    fn tool_calls(&mut self, calls: Vec<ToolCallRequest>) {
        self.emit(AgentEvent::ToolCalls(calls));
    }
    fn tool_results(&mut self, results: Vec<ToolResultEvent>) {
        self.emit(AgentEvent::ToolResults(results));
    }
    fn status(&mut self, message: &str) {
        self.emit(AgentEvent::Status(message.to_string()));
    }
    fn error(&mut self, message: &str) {
        self.emit(AgentEvent::Error(message.to_string()));
    }
    fn completed(&mut self, status: InteractionStatus) {
        self.emit(AgentEvent::Completed { status });
    }
}

/// In-memory sink for tests and for callers that want to replay the stream
/// rather than consume it live.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    pub events: Vec<AgentEvent>,
}

impl EventSink for RecordingEventSink {
    fn emit(&mut self, event: AgentEvent) {
        self.events.push(event);
    }
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_completed_status(&self) -> Option<InteractionStatus> {
        self.events.iter().rev().find_map(|e| match e {
            AgentEvent::Completed { status } => Some(*status),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_tracks_final_status() {
        let mut sink = RecordingEventSink::new();
        sink.status("starting");
        sink.completed(InteractionStatus::CompletedOk);
        assert_eq!(
            sink.last_completed_status(),
            Some(InteractionStatus::CompletedOk)
        );
        assert_eq!(sink.events.len(), 2);
    }
}
