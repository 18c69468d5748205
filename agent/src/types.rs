//! Shared data model (spec.md §3): `Message`, `ToolCallRequest`, `ToolResult`,
//! `ScratchpadEntry`, `ToolDefinition`, `InteractionStatus`.
//!
//! `SessionState` lives in [`crate::session`]; external-collaborator
//! interfaces live in [`crate::traits`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A logical, monotonic-orderable clock tick. Sessions hand these out via
/// [`crate::session::SessionState::next_timestamp`] rather than reading the
/// wall clock, so turn construction stays deterministic and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// Tag for non-plain-text assistant/system messages (spec.md §3, §4.2 step 1).
/// Internal messages are kept in history only when their type is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    WorkflowStage,
    Thought,
    Reflection,
    Plan,
    ContextSummary,
    /// Anything else the caller tags; never treated as "important internal"
    /// by the history preparer's optimize step.
    Other(String),
}

impl MessageType {
    /// Types the history preparer keeps among internal messages (spec.md §4.2 step 1).
    pub fn is_keepable_internal(&self) -> bool {
        matches!(
            self,
            MessageType::WorkflowStage
                | MessageType::Thought
                | MessageType::Reflection
                | MessageType::Plan
                | MessageType::ContextSummary
        )
    }

    /// Types counted as "important internal" during history optimization
    /// (spec.md §4.2 step 2: workflow-stage, reflection, plan — NOT thought
    /// or context-summary, which are high-volume/ synthetic respectively).
    pub fn is_important_internal(&self) -> bool {
        matches!(
            self,
            MessageType::WorkflowStage | MessageType::Reflection | MessageType::Plan
        )
    }
}

/// One element of the conversation log (spec.md §3 `Message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(default)]
    pub is_error: bool,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn system(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            is_internal: false,
            message_type: None,
            is_error: false,
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            is_internal: false,
            message_type: None,
            is_error: false,
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            is_internal: false,
            message_type: None,
            is_error: false,
            timestamp,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
            is_internal: false,
            message_type: None,
            is_error: false,
            timestamp,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            is_internal: false,
            message_type: None,
            is_error,
            timestamp,
        }
    }

    pub fn internal(
        role: Role,
        content: impl Into<String>,
        message_type: MessageType,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            is_internal: true,
            message_type: Some(message_type),
            is_error: false,
            timestamp,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map_or(false, |tc| !tc.is_empty())
    }
}

/// A tool invocation the model asked for (spec.md §3 `ToolCallRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Stable within the session's assistant messages. Generated client-side
    /// by the stream processor when the provider doesn't supply one.
    pub id: String,
    pub name: String,
    /// Serialized JSON string (not a parsed map — parsing happens at the
    /// pipeline/history boundary, per spec.md §4.2 step 4 and §4.3 step 2).
    pub arguments: String,
}

/// A tool message payload produced by the pipeline (spec.md §3 `ToolResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// Bounded short-term memory of recent tool results (spec.md §3 `ScratchpadEntry`, I5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub tool_name: String,
    pub tool_input: String,
    pub result: String,
    pub is_error: bool,
    /// Truncated to <= 150 chars by the producer (`pipeline::summarize`).
    pub summary: String,
    pub timestamp: Timestamp,
}

/// Cap enforced on the scratchpad everywhere it is mutated (invariant I5 / P8).
pub const SCRATCHPAD_CAP: usize = 10;

/// One property of a [`ToolDefinition`]'s JSON-schema-like parameter block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Static metadata used by the selector for ranking and permission filtering
/// (spec.md §3 `ToolDefinition.metadata`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    /// 1-10; weights how many times name+description repeat in the indexable text.
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permission_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_not_to_use: Option<String>,
}

fn default_importance() -> u8 {
    5
}

/// A tool the model may be offered (spec.md §3 `ToolDefinition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub metadata: ToolMetadata,
}

impl ToolDefinition {
    /// Does `user` hold the permission this tool requires, if any (spec.md §4.1
    /// step 8 / P7)?
    pub fn permitted_for(&self, user: &UserContext) -> bool {
        match &self.metadata.required_permission_name {
            None => true,
            Some(perm) => user.permissions.contains(perm),
        }
    }
}

/// Minimal identity + permission set the selector and pipeline consult
/// (spec.md §3 `SessionState.current_user`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
}

/// Closed set of terminal/near-terminal turn states (spec.md §3 `InteractionStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    Processing,
    CompletedOk,
    CompletedEmpty,
    WaitingUserInput,
    ToolError,
    LlmFailure,
    MaxCallsReached,
    HistoryResetRequired,
    CriticalHistoryError,
    UnexpectedAgentError,
    WorkflowCompleted,
    WorkflowError,
    WorkflowMaxCycles,
    WorkflowUnexpectedError,
}

impl InteractionStatus {
    /// Statuses that end a turn outright without falling through to the
    /// general LLM<->tool loop (spec.md §4.5 "Workflow").
    pub fn is_turn_terminal(self) -> bool {
        matches!(
            self,
            InteractionStatus::WaitingUserInput
                | InteractionStatus::HistoryResetRequired
                | InteractionStatus::WorkflowCompleted
                | InteractionStatus::WorkflowError
                | InteractionStatus::WorkflowMaxCycles
                | InteractionStatus::WorkflowUnexpectedError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_for_allows_permission_free_tools() {
        let tool = ToolDefinition {
            name: "help".into(),
            description: "d".into(),
            parameters: serde_json::json!({}),
            metadata: ToolMetadata::default(),
        };
        let user = UserContext::default();
        assert!(tool.permitted_for(&user));
    }

    #[test]
    fn permitted_for_requires_matching_permission() {
        let mut meta = ToolMetadata::default();
        meta.required_permission_name = Some("JIRA_READ".into());
        let tool = ToolDefinition {
            name: "user-issues".into(),
            description: "d".into(),
            parameters: serde_json::json!({}),
            metadata: meta,
        };
        let mut user = UserContext::default();
        assert!(!tool.permitted_for(&user));
        user.permissions.insert("JIRA_READ".to_string());
        assert!(tool.permitted_for(&user));
    }

    #[test]
    fn is_turn_terminal_covers_workflow_statuses() {
        assert!(InteractionStatus::WorkflowCompleted.is_turn_terminal());
        assert!(InteractionStatus::WaitingUserInput.is_turn_terminal());
        assert!(!InteractionStatus::ToolError.is_turn_terminal());
        assert!(!InteractionStatus::Processing.is_turn_terminal());
    }
}
