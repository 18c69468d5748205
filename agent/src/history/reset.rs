//! Reset signal detection (spec.md §4.2 "Reset signal"): recognizes
//! provider error messages that indicate unrecoverable history corruption,
//! distinct from a context-overflow error (handled by
//! [`super::overflow`]).

const ROLE_ALTERNATION_PHRASES: &[&str] = &[
    "tool must follow model",
    "model must follow tool",
    "invalid history",
];

/// Should this provider error trigger the full history reset procedure
/// (`SessionState::reset_history`)?
pub fn is_reset_trigger(message: &str) -> bool {
    let lower = message.to_lowercase();

    if lower.contains("proto") && lower.contains("schema") {
        return true;
    }
    if lower.contains("role") && lower.contains("alternation") {
        return true;
    }
    if ROLE_ALTERNATION_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    // A bare HTTP 400 not tagged as a content-safety block is treated as a
    // history corruption signal; safety/blocked errors are not recoverable
    // by resetting history and are surfaced as ordinary LLM failures instead.
    if lower.contains("400") && !lower.contains("safety") && !lower.contains("blocked") {
        return true;
    }
    false
}
