//! Oversized tool-result truncation (SPEC_FULL.md §B.2): a pure, synchronous
//! fallback for results whose serialized content exceeds
//! `TOOL_RESULT_MAX_CHARS`. No LLM re-summarization — that transport is out
//! of scope for this crate.

use turnkit_core::strutil::truncate_with_marker;

/// Truncate `content` if it exceeds `max_chars`; otherwise return it unchanged.
pub fn truncate_if_oversized(content: String, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content
    } else {
        truncate_with_marker(&content, max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_small_content_untouched() {
        assert_eq!(truncate_if_oversized("ok".into(), 100), "ok");
    }

    #[test]
    fn truncates_oversized_content() {
        let huge = "x".repeat(20_000);
        let out = truncate_if_oversized(huge, 12_000);
        assert!(out.len() < 20_000);
        assert!(out.contains("truncated"));
    }
}
