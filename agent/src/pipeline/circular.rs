//! Circular-call detection (spec.md §4.3 step 4, invariant I6, P4).
//!
//! The GLOSSARY names md5 for the arg hash; this crate's dependency stack
//! carries `sha2`/`hex` (used the same way the teacher hashes skill
//! manifests) rather than adding a one-off md5 crate, so the fingerprint is
//! a sha256 hex digest instead. Only uniqueness/stability across identical
//! `(name, args)` pairs is actually load-bearing here.

use sha2::{Digest, Sha256};

use crate::session::PreviousToolCall;

/// Fingerprint a tool call for circular-call comparisons (GLOSSARY "Arg hash").
pub fn arg_hash(name: &str, args_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(args_json.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Consecutive identical-call retry budget: 2 retries permitted (3 total
/// attempts) before the 4th is blocked (spec.md §4.3 step 4, P4).
const MAX_CONSECUTIVE_IDENTICAL: usize = 3;
/// Beyond this many *similar* (not necessarily identical) prior calls to the
/// same tool, the call is also blocked (`MAX_SIMILAR_TOOL_CALLS - 1`).
const MAX_SIMILAR: usize = 2;
const SIMILARITY_THRESHOLD: f64 = 0.85;

pub enum CircularVerdict {
    Allowed,
    Circular,
}

/// Is `(name, args_json)` circular given the session's call history?
pub fn check(name: &str, args_json: &str, history: &[PreviousToolCall]) -> CircularVerdict {
    let hash = arg_hash(name, args_json);

    let consecutive = history
        .iter()
        .rev()
        .take_while(|c| c.name.eq_ignore_ascii_case(name) && c.arg_hash == hash)
        .count();
    if consecutive >= MAX_CONSECUTIVE_IDENTICAL {
        return CircularVerdict::Circular;
    }

    let similar = history
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case(name) && args_similar(&c.arguments, args_json))
        .count();
    if similar >= MAX_SIMILAR {
        return CircularVerdict::Circular;
    }

    CircularVerdict::Allowed
}

/// String-similarity ratio in the spirit of Python's
/// `difflib.SequenceMatcher.ratio()`: `2*M / T` where `M` is the number of
/// matching characters found by a greedy longest-common-substring walk and
/// `T` is the combined length of both strings.
fn args_similar(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() && b.is_empty() {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    sequence_matcher_ratio(a, b) >= SIMILARITY_THRESHOLD
}

fn sequence_matcher_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let matches = longest_common_subsequence(&a, &b);
    let total = a.len() + b.len();
    if total == 0 {
        1.0
    } else {
        (2 * matches) as f64 / total as f64
    }
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (n, m) = (a.len(), b.len());
    let mut prev = vec![0usize; m + 1];
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        for j in 1..=m {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &str) -> PreviousToolCall {
        PreviousToolCall {
            id: "id".into(),
            name: name.into(),
            arguments: args.into(),
            arg_hash: arg_hash(name, args),
        }
    }

    #[test]
    fn arg_hash_is_case_and_whitespace_stable() {
        assert_eq!(arg_hash("Repo-List", " {} "), arg_hash("repo-list", "{}"));
    }

    #[test]
    fn allows_up_to_three_consecutive_identical_calls() {
        let history = vec![call("repo-list", "{}"), call("repo-list", "{}")];
        assert!(matches!(
            check("repo-list", "{}", &history),
            CircularVerdict::Allowed
        ));
    }

    #[test]
    fn blocks_the_fourth_consecutive_identical_call() {
        let history = vec![
            call("repo-list", "{}"),
            call("repo-list", "{}"),
            call("repo-list", "{}"),
        ];
        assert!(matches!(
            check("repo-list", "{}", &history),
            CircularVerdict::Circular
        ));
    }

    #[test]
    fn blocks_on_similar_but_not_identical_args() {
        let history = vec![
            call("project-issues", r#"{"project":"ENG"}"#),
            call("project-issues", r#"{"project":"ENG1"}"#),
        ];
        assert!(matches!(
            check("project-issues", r#"{"project":"ENG2"}"#, &history),
            CircularVerdict::Circular
        ));
    }

    #[test]
    fn empty_vs_nonempty_args_are_not_similar() {
        assert!(!args_similar("", r#"{"a":1}"#));
        assert!(args_similar("", ""));
    }
}
