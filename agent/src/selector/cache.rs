//! Persistent, process-wide embedding cache (spec.md §4.1 "Embeddings &
//! cache", §5 "Shared resources", §6 "Persistence").
//!
//! The cache file is a single JSON document: `{embeddings, metadata,
//! timestamp, version}`. Writes are atomic (temp file + rename; the prior
//! file is renamed to `.bak` first). Reads are copy-on-load: a malformed
//! cache falls back to the backup, then to empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ToolDefinition;

/// Current on-disk schema version. Bumped whenever the cache's shape changes
/// in a way old readers can't tolerate.
const CACHE_VERSION: u32 = 1;

/// Computes an embedding vector for arbitrary text. A real implementation
/// wraps a hosted or local embedding model; this crate only depends on the
/// interface (spec.md §1 "deliberately out of scope": the embedding model
/// binding is an external collaborator, same footing as the LLM transport).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    pub embeddings: HashMap<String, Vec<f32>>,
    pub metadata: HashMap<String, ToolDefinition>,
    pub timestamp: i64,
    pub version: u32,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self {
            embeddings: HashMap::new(),
            metadata: HashMap::new(),
            timestamp: 0,
            version: CACHE_VERSION,
        }
    }
}

impl EmbeddingCache {
    /// Load from `path`; on malformed contents try `path.bak`; else empty.
    pub fn load(path: &Path) -> Self {
        if let Some(cache) = Self::try_load_file(path) {
            return cache;
        }
        let backup = backup_path(path);
        if let Some(cache) = Self::try_load_file(&backup) {
            tracing::warn!(
                "tool embedding cache at {} was malformed; recovered from backup",
                path.display()
            );
            return cache;
        }
        tracing::info!(
            "no usable tool embedding cache at {}; starting empty",
            path.display()
        );
        Self::default()
    }

    fn try_load_file(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Atomic write: serialize to a temp file in the same directory, rename
    /// the existing cache (if any) to `.bak`, then rename the temp file into
    /// place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating cache directory {}", dir.display()))?;

        let tmp_path = path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(self).context("serializing embedding cache")?;
        std::fs::write(&tmp_path, &bytes)
            .with_context(|| format!("writing temp cache file {}", tmp_path.display()))?;

        if path.exists() {
            let backup = backup_path(path);
            std::fs::rename(path, &backup)
                .with_context(|| format!("backing up cache to {}", backup.display()))?;
        }
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming temp cache into place at {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, tool_name: &str) -> Option<&Vec<f32>> {
        self.embeddings.get(tool_name)
    }

    pub fn insert(&mut self, tool_name: String, embedding: Vec<f32>, optimized: ToolDefinition) {
        self.embeddings.insert(tool_name.clone(), embedding);
        self.metadata.insert(tool_name, optimized);
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

/// Cosine similarity between two equal-length vectors; 0.0 if either is
/// zero-length or dimensions mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Auto-save policy (spec.md §4.1): save when dirty and >= the configured
/// interval has elapsed since the last save. Elapsed time is injected
/// (seconds since last save) rather than read from the wall clock so tests
/// stay deterministic.
pub fn should_auto_save(dirty: bool, seconds_since_last_save: u64, interval_seconds: u64) -> bool {
    dirty && seconds_since_last_save >= interval_seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolMetadata;

    fn sample_tool() -> ToolDefinition {
        ToolDefinition {
            name: "repo-list".into(),
            description: "List repositories".into(),
            parameters: serde_json::json!({}),
            metadata: ToolMetadata::default(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = EmbeddingCache::default();
        cache.insert("repo-list".into(), vec![0.1, 0.2, 0.3], sample_tool());
        cache.save(&path).unwrap();

        let loaded = EmbeddingCache::load(&path);
        assert_eq!(loaded.get("repo-list"), Some(&vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn save_backs_up_prior_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = EmbeddingCache::default();
        cache.insert("a".into(), vec![1.0], sample_tool());
        cache.save(&path).unwrap();

        cache.insert("b".into(), vec![2.0], sample_tool());
        cache.save(&path).unwrap();

        assert!(backup_path(&path).exists());
        let loaded = EmbeddingCache::load(&path);
        assert!(loaded.get("a").is_some() && loaded.get("b").is_some());
    }

    #[test]
    fn load_falls_back_to_backup_on_malformed_primary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut good = EmbeddingCache::default();
        good.insert("a".into(), vec![1.0], sample_tool());
        std::fs::write(backup_path(&path), serde_json::to_vec(&good).unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let loaded = EmbeddingCache::load(&path);
        assert!(loaded.get("a").is_some());
    }

    #[test]
    fn load_returns_empty_when_nothing_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded = EmbeddingCache::load(&path);
        assert!(loaded.embeddings.is_empty());
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn auto_save_policy() {
        assert!(!should_auto_save(false, 1000, 300));
        assert!(!should_auto_save(true, 100, 300));
        assert!(should_auto_save(true, 300, 300));
    }
}
