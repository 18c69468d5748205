//! Ambient support layer shared by every `turnkit` crate: env-driven
//! configuration, the closed error taxonomy, and UTF-8-safe string helpers.
//!
//! Mirrors the role `skilllite-core` plays for `skilllite-agent`: business
//! code reaches for structured config here instead of reading
//! `std::env::var` directly.

pub mod config;
pub mod error;
pub mod strutil;

pub use error::CoreError;
