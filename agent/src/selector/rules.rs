//! Keyword/intent rules and category inference (spec.md §4.1 steps 2-4).
//!
//! Tool names referenced here are the generic ones spec.md names directly:
//! `help`, `repo-list`, `user-issues`, `project-issues`, `code-search`,
//! `web-search`.

use regex::Regex;
use std::sync::OnceLock;

fn project_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Z0-9_]{1,15}\b").unwrap())
}

/// Direct, high-confidence intent matches (spec.md §4.1 step 2). Order is
/// significant: `help` short-circuits the whole selection in the caller.
pub fn direct_intent_tools(query: &str) -> Vec<String> {
    let q = query.to_lowercase();
    let mut tools = Vec::new();

    let help_phrases = ["help", "what can you do", "commands", "capabilities"];
    if help_phrases.iter().any(|p| q.contains(p)) {
        tools.push("help".to_string());
        return tools; // help is exclusive — caller returns [help] only.
    }

    let repo_keywords = ["repos", "repositories", "github", "repository"];
    let list_verbs = ["my", "list", "show"];
    if repo_keywords.iter().any(|k| q.contains(k)) && list_verbs.iter().any(|v| q.contains(v)) {
        tools.push("repo-list".to_string());
    }

    let ticket_keywords = ["jira", "tickets", "issues"];
    if ticket_keywords.iter().any(|k| q.contains(k)) && q.contains("my") {
        tools.push("user-issues".to_string());
    }

    let has_project_key = project_key_re().is_match(query);
    if ticket_keywords.iter().any(|k| q.contains(k))
        && (q.contains("project") || has_project_key)
        && !q.contains("my")
    {
        let name = "project-issues".to_string();
        if !tools.contains(&name) {
            tools.push(name);
        }
    }

    if q.contains("search") && q.contains("code") {
        tools.push("code-search".to_string());
    }

    let web_phrases = ["what is", "tell me about", "search for"];
    if web_phrases.iter().any(|p| q.contains(p)) {
        tools.push("web-search".to_string());
    }

    tools
}

/// Entity-mention boosts (spec.md §4.1 step 3): a superset of direct intent
/// that may additionally surface tools not already selected — e.g. a bare
/// "repos"/"github" mention without a list verb still nudges `repo-list` in
/// as a boost candidate.
pub fn entity_mention_tools(query: &str) -> Vec<String> {
    let q = query.to_lowercase();
    let mut tools = Vec::new();

    let repo_keywords = ["repos", "repositories", "github", "repository"];
    if repo_keywords.iter().any(|k| q.contains(k)) {
        tools.push("repo-list".to_string());
    }

    if project_key_re().is_match(query) && q.contains("project") {
        tools.push("project-issues".to_string());
    }

    tools
}

/// Coarse category tags inferred from the query text, used for the +0.1
/// per-category-match boost in embedding ranking (spec.md §4.1 step 6c).
pub fn infer_categories(query: &str) -> Vec<String> {
    let q = query.to_lowercase();
    let mut categories = Vec::new();
    let table: &[(&str, &[&str])] = &[
        ("vcs", &["repo", "github", "git", "commit", "branch"]),
        ("issue-tracking", &["jira", "ticket", "issue", "bug"]),
        ("search", &["search", "find", "look up", "lookup"]),
        ("code", &["code", "function", "class", "file"]),
        ("web", &["web", "internet", "browse", "url"]),
    ];
    for (category, keywords) in table {
        if keywords.iter().any(|k| q.contains(k)) {
            categories.push(category.to_string());
        }
    }
    categories
}

/// Greetings that suppress tool offering on the initial cycle unless the
/// query is also help-related (spec.md §4.5 General loop, step 1).
pub fn is_bare_greeting(query: &str) -> bool {
    const GREETINGS: &[&str] = &["hello", "hi", "thanks", "bye", "how are you"];
    let q = query.trim().to_lowercase();
    GREETINGS.contains(&q.as_str()) && !q.contains("help")
}
