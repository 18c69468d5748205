//! UTF-8 safe string helpers.
//!
//! Ported from `skilllite-agent::types::{safe_truncate, safe_slice_from,
//! chunk_str}` — tool output and model text can end mid-codepoint at any
//! byte offset, so every truncation in this workspace routes through here.

/// Truncate `s` to at most `max_bytes`, never splitting a multi-byte char.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Slice `s` from approximately `start_pos`, nudged forward to a char boundary.
pub fn safe_slice_from(s: &str, start_pos: usize) -> &str {
    if start_pos >= s.len() {
        return "";
    }
    let mut start = start_pos;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Head+tail truncate with a marker, used for oversized tool results and
/// context-overflow recovery. Never panics on non-ASCII input.
pub fn truncate_with_marker(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    format!(
        "{}...\n[truncated: {} chars \u{2192} {}]",
        safe_truncate(s, max_bytes),
        s.chars().count(),
        max_bytes
    )
}

/// Redact obvious secret-shaped substrings before a value is logged.
/// Case-insensitive match on a small set of key names; the value is not
/// parsed as JSON, so this is a best-effort net for debug tracing, not a
/// security boundary.
pub fn redact_for_log(s: &str) -> String {
    const SECRET_KEYS: &[&str] = &["api_key", "apikey", "token", "password", "secret"];
    let lower = s.to_lowercase();
    if SECRET_KEYS.iter().any(|k| lower.contains(k)) {
        "[redacted]".to_string()
    } else {
        s.to_string()
    }
}
