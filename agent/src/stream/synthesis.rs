//! Result-synthesis insertion (spec.md §4.4 "Result synthesis (optional)",
//! §9 open question (c)). Heuristic and disabled via
//! `EngineConfig.result_synthesis_enabled` when a caller doesn't want the
//! model's own text rewritten.

use std::collections::VecDeque;

use crate::types::ScratchpadEntry;

const SYNTHESIS_PHRASES: &[&str] = &[
    "based on the tool results",
    "according to the tool",
    "the tool returned",
    "as shown by the tool",
    "from the data provided by",
];

/// Does `text` look like it's narrating tool output, warranting a synthesis
/// block appended after it?
pub fn mentions_tool_results(text: &str) -> bool {
    let lower = text.to_lowercase();
    SYNTHESIS_PHRASES.iter().any(|p| lower.contains(p))
}

/// Build the synthesis block summarizing the scratchpad's recent entries:
/// success/failure counts plus one preview line per tool.
pub fn build_block(scratchpad: &VecDeque<ScratchpadEntry>) -> String {
    if scratchpad.is_empty() {
        return String::new();
    }
    let success = scratchpad.iter().filter(|e| !e.is_error).count();
    let failed = scratchpad.len() - success;

    let mut lines = vec![format!(
        "\n\n[Tool results: {success} succeeded, {failed} failed]"
    )];
    for entry in scratchpad.iter() {
        lines.push(format!("- {}: {}", entry.tool_name, entry.summary));
    }
    lines.join("\n")
}

/// Decide whether to append a synthesis block, and produce it if so.
pub fn maybe_synthesize(
    text: &str,
    had_pending_tool_results: bool,
    scratchpad: &VecDeque<ScratchpadEntry>,
    enabled: bool,
) -> Option<String> {
    if !enabled || !had_pending_tool_results || scratchpad.is_empty() {
        return None;
    }
    if !mentions_tool_results(text) {
        return None;
    }
    let block = build_block(scratchpad);
    if block.is_empty() {
        None
    } else {
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn entry(name: &str, is_error: bool, summary: &str) -> ScratchpadEntry {
        ScratchpadEntry {
            tool_name: name.to_string(),
            tool_input: "{}".to_string(),
            result: "{}".to_string(),
            is_error,
            summary: summary.to_string(),
            timestamp: Timestamp(1),
        }
    }

    #[test]
    fn detects_synthesis_phrases_case_insensitively() {
        assert!(mentions_tool_results("Based on the Tool Results, you have 2 repos."));
        assert!(!mentions_tool_results("Hello there!"));
    }

    #[test]
    fn no_synthesis_without_pending_tool_results() {
        let pad: VecDeque<ScratchpadEntry> = VecDeque::from(vec![entry("repo-list", false, "Retrieved 2 dicts")]);
        assert!(maybe_synthesize("the tool returned 2 repos", false, &pad, true).is_none());
    }

    #[test]
    fn builds_block_with_counts_and_previews() {
        let pad: VecDeque<ScratchpadEntry> = VecDeque::from(vec![
            entry("repo-list", false, "Retrieved 2 dicts"),
            entry("user-issues", true, "error=denied"),
        ]);
        let out = maybe_synthesize("Based on the tool results, here's what I found.", true, &pad, true)
            .unwrap();
        assert!(out.contains("1 succeeded, 1 failed"));
        assert!(out.contains("repo-list: Retrieved 2 dicts"));
    }

    #[test]
    fn disabled_flag_suppresses_synthesis() {
        let pad: VecDeque<ScratchpadEntry> = VecDeque::from(vec![entry("repo-list", false, "ok")]);
        assert!(maybe_synthesize("the tool returned data", true, &pad, false).is_none());
    }
}
