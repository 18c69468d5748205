//! Step 1 of the preparer pipeline (spec.md §4.2): drop plain system
//! messages, keep workflow-stage/keepable-internal ones, keep all
//! user/assistant/tool messages untouched.

use crate::types::{Message, Role};

pub fn filter(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| keep(m))
        .cloned()
        .collect()
}

fn keep(m: &Message) -> bool {
    if m.is_internal {
        return m
            .message_type
            .as_ref()
            .map_or(false, |t| t.is_keepable_internal());
    }
    if matches!(m.role, Role::System) {
        // A non-internal system message is the system prompt itself, passed
        // out-of-band to the provider — never part of the conversation body.
        return false;
    }
    true
}
