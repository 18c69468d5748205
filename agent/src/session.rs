//! `SessionState`: the single owning entity per session (spec.md §3, §9
//! "Global state").

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{
    InteractionStatus, Message, ScratchpadEntry, Timestamp, UserContext, SCRATCHPAD_CAP,
};

/// Fingerprint of a past tool call, used for circular-call detection
/// (spec.md §4.3 step 4, "Arg hash" in the GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub arg_hash: String,
}

/// Per-tool execution counters (spec.md §3 `session_stats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: u64,
    pub failures: u64,
}

/// Aggregate session statistics (spec.md §3 `session_stats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub llm_call_count: u64,
    pub token_count: u64,
    pub tool_calls: u64,
    pub failed_tool_calls: u64,
    pub per_tool: HashMap<String, ToolStats>,
    pub turn_durations_ms: Vec<u64>,
}

impl SessionStats {
    pub fn record_tool_call(&mut self, tool_name: &str, is_error: bool) {
        self.tool_calls += 1;
        if is_error {
            self.failed_tool_calls += 1;
        }
        let entry = self.per_tool.entry(tool_name.to_string()).or_default();
        entry.calls += 1;
        if is_error {
            entry.failures += 1;
        }
    }
}

/// Lifecycle state of a delegated workflow (spec.md §4.5 "Workflow", GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Completed,
    Failed,
}

/// Opaque handoff state for an active workflow. The workflow's own internal
/// state machine is out of scope (spec.md §1); this is just enough for the
/// engine to know whether one is active and to move it to
/// `completed_workflows` on completion or reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub workflow_id: String,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Durable per-session state (spec.md §3 `SessionState`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub previous_tool_calls: Vec<PreviousToolCall>,
    pub scratchpad: VecDeque<ScratchpadEntry>,
    pub active_workflows: HashMap<String, WorkflowContext>,
    pub completed_workflows: Vec<WorkflowContext>,
    pub current_user: UserContext,
    pub session_stats: SessionStats,
    pub streaming_placeholder_content: String,
    pub current_status_message: Option<String>,
    pub current_step_error: Option<String>,
    pub last_interaction_status: InteractionStatus,
    pub is_streaming: bool,
    /// Logical clock driving `Timestamp` issuance; monotonic within a session.
    clock: u64,
}

impl SessionState {
    pub fn new(current_user: UserContext) -> Self {
        Self {
            messages: Vec::new(),
            previous_tool_calls: Vec::new(),
            scratchpad: VecDeque::new(),
            active_workflows: HashMap::new(),
            completed_workflows: Vec::new(),
            current_user,
            session_stats: SessionStats::default(),
            streaming_placeholder_content: String::new(),
            current_status_message: None,
            current_step_error: None,
            last_interaction_status: InteractionStatus::Processing,
            is_streaming: false,
            clock: 0,
        }
    }

    /// Hand out the next tick of the session's logical clock (spec.md §3,
    /// `timestamp (monotonic-orderable)`).
    pub fn next_timestamp(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp(self.clock)
    }

    /// Append a scratchpad entry, evicting the oldest if at capacity
    /// (invariant I5 / P8).
    pub fn push_scratchpad(&mut self, entry: ScratchpadEntry) {
        self.scratchpad.push_back(entry);
        while self.scratchpad.len() > SCRATCHPAD_CAP {
            self.scratchpad.pop_front();
        }
    }

    /// Record a resolved tool call for circular-call detection (invariant I6).
    pub fn push_previous_tool_call(&mut self, call: PreviousToolCall) {
        self.previous_tool_calls.push(call);
    }

    /// Reset procedure (spec.md §4.2 "Reset signal"): purge all non-system
    /// messages, clear scratchpad/previous-tool-calls, move active workflows
    /// to the completed log with status=failed.
    pub fn reset_history(&mut self, apology: Message) {
        self.messages.retain(|m| matches!(m.role, crate::types::Role::System));
        self.messages.push(apology);
        self.scratchpad.clear();
        self.previous_tool_calls.clear();
        for (_, mut ctx) in self.active_workflows.drain() {
            ctx.status = WorkflowStatus::Failed;
            self.completed_workflows.push(ctx);
        }
        self.last_interaction_status = InteractionStatus::HistoryResetRequired;
    }

    /// Is any workflow of the given type currently active (spec.md §4.5)?
    pub fn active_workflow_of_type(&self, workflow_type: &str) -> Option<&WorkflowContext> {
        self.active_workflows
            .values()
            .find(|w| w.workflow_type == workflow_type && w.status == WorkflowStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn timestamps_are_monotonic() {
        let mut s = SessionState::new(UserContext::default());
        let a = s.next_timestamp();
        let b = s.next_timestamp();
        assert!(b.0 > a.0);
    }

    #[test]
    fn scratchpad_cap_enforced() {
        let mut s = SessionState::new(UserContext::default());
        for i in 0..15 {
            let ts = s.next_timestamp();
            s.push_scratchpad(ScratchpadEntry {
                tool_name: format!("t{i}"),
                tool_input: "{}".into(),
                result: "{}".into(),
                is_error: false,
                summary: "ok".into(),
                timestamp: ts,
            });
        }
        assert_eq!(s.scratchpad.len(), SCRATCHPAD_CAP);
        assert_eq!(s.scratchpad.front().unwrap().tool_name, "t5");
        assert_eq!(s.scratchpad.back().unwrap().tool_name, "t14");
    }

    #[test]
    fn reset_history_purges_non_system_and_fails_workflows() {
        let mut s = SessionState::new(UserContext::default());
        let ts = s.next_timestamp();
        s.messages.push(Message::system("sys", ts));
        let ts = s.next_timestamp();
        s.messages.push(Message::user("hi", ts));
        s.active_workflows.insert(
            "wf1".into(),
            WorkflowContext {
                workflow_id: "wf1".into(),
                workflow_type: "story_builder".into(),
                status: WorkflowStatus::Active,
                data: serde_json::json!({}),
            },
        );
        let ts = s.next_timestamp();
        s.reset_history(Message::assistant("history was reset", ts));

        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.messages[0].role, Role::System);
        assert_eq!(s.messages[1].role, Role::Assistant);
        assert!(s.active_workflows.is_empty());
        assert_eq!(s.completed_workflows.len(), 1);
        assert_eq!(s.completed_workflows[0].status, WorkflowStatus::Failed);
        assert_eq!(
            s.last_interaction_status,
            InteractionStatus::HistoryResetRequired
        );
    }
}
