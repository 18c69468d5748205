//! History Preparer (spec.md §4.2): turns the session's message log into a
//! provider-consumable, alternation-respecting sequence.
//!
//! `prepare(messages, maxItems, scratchpad) -> (providerSequence, warnings)`.
//! The reset procedure itself is a session-level operation
//! ([`crate::session::SessionState::reset_history`]); this module only
//! recognizes *when* a provider error calls for it ([`reset::is_reset_trigger`]).

pub mod filter;
pub mod optimize;
pub mod overflow;
pub mod provider;
pub mod reset;
pub mod scratchpad;

use crate::traits::ProviderTurn;
use crate::types::{Message, ScratchpadEntry};

/// The preparer's output (spec.md §4.2 contract).
#[derive(Debug, Clone)]
pub struct PreparedHistory {
    pub turns: Vec<ProviderTurn>,
    pub warnings: Vec<String>,
    /// Set when the sequence is fundamentally unrepairable. In practice the
    /// repair pass (placeholders + drops) resolves every case this pipeline
    /// can construct; this flag is reserved for the engine's
    /// `CRITICAL_HISTORY_ERROR` path (spec.md §4.5 General loop, step 3)
    /// should a future caller feed it a structurally invalid message list.
    pub critical: bool,
}

/// Run the full preparer pipeline: filter, optimize, scratchpad injection,
/// then map/reconcile/repair into provider turns.
pub fn prepare(
    messages: &[Message],
    max_items: usize,
    scratchpad: &[ScratchpadEntry],
) -> PreparedHistory {
    let filtered = filter::filter(messages);
    let optimized = optimize::optimize(filtered, max_items);
    let mut with_scratchpad = optimized;
    scratchpad::inject(&mut with_scratchpad, scratchpad);

    let (turns, warnings) = provider::assemble(&with_scratchpad);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "history preparer repaired sequence violations");
    }

    PreparedHistory {
        turns,
        warnings,
        critical: false,
    }
}
