//! Context-overflow recovery (SPEC_FULL.md §B.1): when the LLM transport
//! reports that the conversation exceeded the provider's context window,
//! the engine truncates tool message contents in place and retries the
//! cycle, bounded by a small counter distinct from `MAX_TOOL_CYCLES_OUTER`.

use crate::types::{Message, Role};
use turnkit_core::strutil::truncate_with_marker;

const OVERFLOW_PATTERNS: &[&str] = &[
    "context length",
    "context_length_exceeded",
    "maximum context",
    "too many tokens",
    "token limit",
    "context window",
];

/// Does this provider error message describe a context-length overflow?
pub fn is_context_overflow_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    OVERFLOW_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Truncate every tool message's content to `max_chars`, in place. Returns
/// how many messages were actually shortened.
pub fn truncate_tool_messages_in_place(messages: &mut [Message], max_chars: usize) -> usize {
    let mut truncated = 0;
    for msg in messages.iter_mut() {
        if matches!(msg.role, Role::Tool) && msg.content.len() > max_chars {
            msg.content = truncate_with_marker(&msg.content, max_chars);
            truncated += 1;
        }
    }
    truncated
}
