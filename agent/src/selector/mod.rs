//! Tool Selector (spec.md §4.1): given a query, catalog, and the user's
//! permissions, returns a ranked, permission-filtered shortlist.

pub mod cache;
pub mod rules;
pub mod schema;

use std::cmp::Ordering;
use std::collections::HashSet;

use turnkit_core::config::{SchemaOptimizationConfig, ToolSelectorConfig, SELECTOR_HARD_CAP};

use crate::types::{ToolDefinition, UserContext};
use cache::{cosine_similarity, EmbeddingCache, EmbeddingProvider};

/// +0.3-0.5 range the spec names for a direct keyword hit; picked at the
/// midpoint since the spec leaves the exact value tunable (spec.md §4.1 step 6a).
const KEYWORD_BOOST: f32 = 0.4;
/// Multiplicative damping applied to general web-search tools below the 0.8
/// similarity cutoff (spec.md §4.1 step 6b, §9 open question (b)).
const WEB_SEARCH_DAMPING: f32 = 0.85;
const WEB_SEARCH_DAMPING_CUTOFF: f32 = 0.8;
/// +0.1 per matched category (spec.md §4.1 step 6c).
const CATEGORY_BOOST: f32 = 0.1;

/// Build (or rebuild) the embedding cache for a catalog: schema-optimizes
/// each tool, embeds its indexable text, and stores both.
pub async fn build_cache(
    catalog: &[ToolDefinition],
    embedder: &dyn EmbeddingProvider,
    schema_cfg: &SchemaOptimizationConfig,
) -> EmbeddingCache {
    let mut cache = EmbeddingCache::default();
    for tool in catalog {
        let optimized = schema::optimize_tool(tool, schema_cfg);
        let text = schema::indexable_text(&optimized);
        match embedder.embed(&text).await {
            Ok(embedding) => cache.insert(tool.name.clone(), embedding, optimized),
            Err(e) => {
                tracing::warn!("failed to embed tool '{}': {e}", tool.name);
            }
        }
    }
    cache
}

/// `select(query, user, catalog, maxTools) -> shortlist` (spec.md §4.1).
///
/// `cache` and `embedder` are both optional: a missing cache or embedder
/// means step 6 (embedding similarity) is skipped, matching the "embedding
/// model unavailable" failure semantics.
pub async fn select(
    query: &str,
    user: &UserContext,
    catalog: &[ToolDefinition],
    max_tools: usize,
    cfg: &ToolSelectorConfig,
    cache: Option<&EmbeddingCache>,
    embedder: Option<&dyn EmbeddingProvider>,
) -> Vec<ToolDefinition> {
    let effective_max = max_tools.min(SELECTOR_HARD_CAP).min(cfg.max_tools);
    let name_to_def: std::collections::HashMap<&str, &ToolDefinition> =
        catalog.iter().map(|t| (t.name.as_str(), t)).collect();

    let ordered_names: Vec<String> = if !cfg.enabled {
        // Step 1: disabled — catalog order, hard-capped downstream.
        catalog.iter().map(|t| t.name.clone()).collect()
    } else {
        let intent = rules::direct_intent_tools(query);
        if intent.first().map(String::as_str) == Some("help") {
            intent
        } else {
            let entity = rules::entity_mention_tools(query);
            let always = cfg.always_include_tools.clone();

            let mut combined: Vec<String> = Vec::new();
            for name in intent.iter().chain(entity.iter()).chain(always.iter()) {
                if name_to_def.contains_key(name.as_str()) && !combined.contains(name) {
                    combined.push(name.clone());
                }
            }

            if combined.len() >= effective_max {
                combined
            } else if let (Some(cache), Some(embedder)) = (cache, embedder) {
                let ranked = embedding_rank(query, catalog, cache, embedder, cfg).await;
                let mut out = combined.clone();
                for name in ranked {
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
                out
            } else if combined.is_empty() {
                // Steps 1-5 yielded nothing and the embedding path is
                // unavailable too: fallback mode (spec.md §4.1 "Failure semantics").
                tracing::info!("tool selector: no intent/entity match and no embedder; falling back to catalog order");
                catalog.iter().map(|t| t.name.clone()).collect()
            } else {
                combined
            }
        }
    };

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in ordered_names {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(def) = name_to_def.get(name.as_str()) {
            // Step 8: permission filter (P7) — applied uniformly, every path.
            if def.permitted_for(user) {
                result.push((*def).clone());
            }
        }
        if result.len() >= effective_max {
            break;
        }
    }
    // Step 9: hard cap (belt-and-suspenders — the loop above already stops at
    // effective_max, which is itself capped at SELECTOR_HARD_CAP).
    result.truncate(SELECTOR_HARD_CAP);
    result
}

async fn embedding_rank(
    query: &str,
    catalog: &[ToolDefinition],
    cache: &EmbeddingCache,
    embedder: &dyn EmbeddingProvider,
    cfg: &ToolSelectorConfig,
) -> Vec<String> {
    let query_embedding = match embedder.embed(query).await {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("tool selector: failed to embed query: {e}");
            return Vec::new();
        }
    };
    let categories = rules::infer_categories(query);
    let query_lower = query.to_lowercase();

    let mut scored: Vec<(String, f32)> = Vec::new();
    for tool in catalog {
        let Some(tool_embedding) = cache.get(&tool.name) else {
            continue;
        };
        let mut score = cosine_similarity(&query_embedding, tool_embedding);

        if tool
            .metadata
            .keywords
            .iter()
            .any(|k| query_lower.contains(&k.to_lowercase()))
        {
            score += KEYWORD_BOOST;
        }

        if tool.name == "web-search" && score < WEB_SEARCH_DAMPING_CUTOFF {
            score *= WEB_SEARCH_DAMPING;
        }

        let matched_categories = tool
            .metadata
            .categories
            .iter()
            .filter(|c| categories.contains(c))
            .count();
        score += CATEGORY_BOOST * matched_categories as f32;

        if score >= cfg.similarity_threshold as f32 {
            scored.push((tool.name.clone(), score));
        }
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolMetadata;
    use anyhow::Result;
    use async_trait::async_trait;

    fn tool(name: &str, keywords: &[&str], categories: &[&str]) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters: serde_json::json!({}),
            metadata: ToolMetadata {
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                categories: categories.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    fn permissioned_tool(name: &str, perm: &str) -> ToolDefinition {
        let mut t = tool(name, &[], &[]);
        t.metadata.required_permission_name = Some(perm.to_string());
        t
    }

    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Deterministic bag-of-words style embedding: presence of a
            // fixed vocabulary token set as a one-hot-ish vector.
            const VOCAB: &[&str] = &["repo", "list", "search", "code", "web", "ticket"];
            let lower = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                .collect())
        }
    }

    #[tokio::test]
    async fn disabled_selector_hard_caps_catalog() {
        let catalog: Vec<_> = (0..10).map(|i| tool(&format!("t{i}"), &[], &[])).collect();
        let cfg = ToolSelectorConfig {
            enabled: false,
            ..ToolSelectorConfig::default()
        };
        let result = select("anything", &UserContext::default(), &catalog, 6, &cfg, None, None).await;
        assert_eq!(result.len(), 6);
    }

    #[tokio::test]
    async fn help_query_returns_only_help() {
        let catalog = vec![tool("help", &[], &[]), tool("repo-list", &[], &[])];
        let cfg = ToolSelectorConfig::default();
        let result = select("help", &UserContext::default(), &catalog, 6, &cfg, None, None).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "help");
    }

    #[tokio::test]
    async fn permission_filter_drops_unpermitted_tools() {
        let catalog = vec![permissioned_tool("user-issues", "JIRA_READ")];
        let cfg = ToolSelectorConfig::default();
        let result = select(
            "show my tickets",
            &UserContext::default(),
            &catalog,
            6,
            &cfg,
            None,
            None,
        )
        .await;
        assert!(result.is_empty());

        let mut user = UserContext::default();
        user.permissions.insert("JIRA_READ".to_string());
        let result = select("show my tickets", &user, &catalog, 6, &cfg, None, None).await;
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn embedding_path_ranks_by_similarity() {
        let catalog = vec![
            tool("repo-list", &["repo"], &["vcs"]),
            tool("unrelated", &[], &[]),
        ];
        let embedder = HashEmbedder;
        let schema_cfg = SchemaOptimizationConfig::default();
        let cache = build_cache(&catalog, &embedder, &schema_cfg).await;
        let cfg = ToolSelectorConfig::default();
        let result = select(
            "please list my repo",
            &UserContext::default(),
            &catalog,
            6,
            &cfg,
            Some(&cache),
            Some(&embedder),
        )
        .await;
        assert!(result.iter().any(|t| t.name == "repo-list"));
    }

    #[tokio::test]
    async fn missing_embedder_falls_back_to_catalog() {
        let catalog = vec![tool("a", &[], &[]), tool("b", &[], &[])];
        let cfg = ToolSelectorConfig::default();
        let result = select(
            "something with no intent match",
            &UserContext::default(),
            &catalog,
            6,
            &cfg,
            None,
            None,
        )
        .await;
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn result_never_exceeds_hard_cap() {
        let catalog: Vec<_> = (0..20).map(|i| tool(&format!("t{i}"), &[], &[])).collect();
        let cfg = ToolSelectorConfig {
            always_include_tools: catalog.iter().map(|t| t.name.clone()).collect(),
            ..ToolSelectorConfig::default()
        };
        let result = select("q", &UserContext::default(), &catalog, 100, &cfg, None, None).await;
        assert_eq!(result.len(), SELECTOR_HARD_CAP);
    }
}
