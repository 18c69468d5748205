//! Unified configuration layer.
//!
//! All environment-variable reads for this workspace are centralized
//! here; business code consumes typed structs instead of calling
//! `std::env::var` directly.
//!
//! - `loader`: `env_or` / `env_optional` / `env_bool` helpers
//! - `schema`: `EngineConfig`, `ToolSelectorConfig`, `SchemaOptimizationConfig`

pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or};
pub use schema::{EngineConfig, SchemaOptimizationConfig, ToolSelectorConfig, SELECTOR_HARD_CAP};
