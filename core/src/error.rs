//! Closed error taxonomy shared across `turnkit` crates (spec §7).

use thiserror::Error;

/// Cross-cutting failures that aren't specific to one pipeline stage
/// (config loading, cache I/O). Component-specific errors live in their
/// own crate modules (`pipeline::error`, `history::error`) and convert
/// into `anyhow::Error` at call boundaries the way the teacher's
/// `skilllite-agent::llm` does.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config value for {key} could not be parsed: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("cache I/O error at {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache contents malformed: {0}")]
    CacheMalformed(String),
}
