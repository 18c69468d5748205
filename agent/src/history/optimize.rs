//! Step 2 of the preparer pipeline (spec.md §4.2): budget the filtered
//! messages to `max_items`, preferring system-like and important-internal
//! entries, then filling the remainder with the most recent traffic.

use crate::types::{Message, Role};

const MAX_IMPORTANT_INTERNAL: usize = 5;

pub fn optimize(messages: Vec<Message>, max_items: usize) -> Vec<Message> {
    if messages.len() <= max_items {
        return messages;
    }

    let is_system_like = |m: &Message| matches!(m.role, Role::System) && m.is_internal;
    let is_important_internal = |m: &Message| {
        m.is_internal
            && m.message_type
                .as_ref()
                .map_or(false, |t| t.is_important_internal())
    };

    let system_like: Vec<&Message> = messages.iter().filter(|m| is_system_like(m)).collect();

    let mut important_internal: Vec<&Message> = messages
        .iter()
        .filter(|m| is_important_internal(m) && !is_system_like(m))
        .collect();
    // Keep the 5 most recent; `messages` is already chronological.
    if important_internal.len() > MAX_IMPORTANT_INTERNAL {
        important_internal = important_internal
            .split_off(important_internal.len() - MAX_IMPORTANT_INTERNAL);
    }

    let remaining_budget = max_items
        .saturating_sub(system_like.len())
        .saturating_sub(important_internal.len());

    // The refill pool is plain user/assistant/tool traffic only — any
    // internal-flagged message (even a keepable-but-not-important one, e.g.
    // Thought/ContextSummary) is excluded rather than left to compete for
    // "most recent" slots (spec.md §4.2 step 2).
    let mut traffic: Vec<&Message> = messages
        .iter()
        .filter(|m| !is_system_like(m) && !is_important_internal(m) && !m.is_internal)
        .collect();
    if traffic.len() > remaining_budget {
        traffic = traffic.split_off(traffic.len() - remaining_budget);
    }

    let mut kept: Vec<&Message> = Vec::with_capacity(system_like.len() + important_internal.len() + traffic.len());
    kept.extend(system_like);
    kept.extend(important_internal);
    kept.extend(traffic);
    kept.sort_by_key(|m| m.timestamp);

    // Budget may still be exceeded if system-like + important-internal alone
    // exceed max_items; drop the oldest non-system entries first.
    if kept.len() > max_items {
        let overflow = kept.len() - max_items;
        let mut dropped = 0;
        kept.retain(|m| {
            if dropped < overflow && !matches!(m.role, Role::System) {
                dropped += 1;
                false
            } else {
                true
            }
        });
    }

    kept.into_iter().cloned().collect()
}
