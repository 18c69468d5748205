//! Step 3 of the preparer pipeline (spec.md §4.2): synthesize a single
//! internal assistant "memory context" message from the scratchpad, unless
//! one is already present.

use crate::types::{Message, MessageType, Role, ScratchpadEntry, Timestamp};

const PREVIEW_CHARS: usize = 60;
const ENTRIES_SHOWN: usize = 5;

pub fn inject(messages: &mut Vec<Message>, scratchpad: &[ScratchpadEntry]) {
    if scratchpad.is_empty() {
        return;
    }
    if messages
        .iter()
        .any(|m| m.message_type == Some(MessageType::ContextSummary))
    {
        return;
    }

    let leading_system_run = messages
        .iter()
        .take_while(|m| matches!(m.role, Role::System))
        .count();

    let ts = next_synthetic_timestamp(messages);
    let content = render(scratchpad);
    let summary_message = Message::internal(Role::Assistant, content, MessageType::ContextSummary, ts);
    messages.insert(leading_system_run, summary_message);
}

fn render(scratchpad: &[ScratchpadEntry]) -> String {
    let mut lines = Vec::new();
    for entry in scratchpad.iter().rev().take(ENTRIES_SHOWN) {
        let args_preview = preview(&entry.tool_input);
        let result_preview = preview(&entry.summary);
        lines.push(format!(
            "- Tool: {}, Args: {}, Result: {} (Time: {})",
            entry.tool_name,
            args_preview,
            result_preview,
            format_hms(entry.timestamp)
        ));
    }
    lines.join("\n")
}

fn preview(s: &str) -> &str {
    turnkit_core::strutil::safe_truncate(s, PREVIEW_CHARS)
}

/// Logical timestamps aren't wall-clock seconds, but the rendered format
/// still wants an `HH:MM:SS`-shaped string; treat the tick as seconds since
/// midnight so output stays deterministic and test-friendly.
fn format_hms(ts: Timestamp) -> String {
    let secs = ts.0 % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn next_synthetic_timestamp(messages: &[Message]) -> Timestamp {
    let max = messages.iter().map(|m| m.timestamp.0).max().unwrap_or(0);
    Timestamp(max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, ts: u64) -> ScratchpadEntry {
        ScratchpadEntry {
            tool_name: name.into(),
            tool_input: "{}".into(),
            result: "{}".into(),
            is_error: false,
            summary: "ok".into(),
            timestamp: Timestamp(ts),
        }
    }

    #[test]
    fn no_op_on_empty_scratchpad() {
        let mut messages = vec![Message::user("hi", Timestamp(1))];
        inject(&mut messages, &[]);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn no_op_when_context_summary_already_present() {
        let mut messages = vec![Message::internal(
            Role::Assistant,
            "existing summary",
            MessageType::ContextSummary,
            Timestamp(1),
        )];
        inject(&mut messages, &[entry("repo-list", 2)]);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn inserts_after_leading_system_messages() {
        let mut messages = vec![
            Message::internal(Role::System, "wf", MessageType::WorkflowStage, Timestamp(1)),
            Message::user("hi", Timestamp(2)),
        ];
        inject(&mut messages, &[entry("repo-list", 3)]);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].message_type, Some(MessageType::ContextSummary));
        assert!(messages[1].content.contains("repo-list"));
    }
}
