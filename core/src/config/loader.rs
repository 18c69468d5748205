//! Env-var reading helpers, mirroring `skilllite-core::config::loader`.

/// Read `key`, falling back through `aliases` in order, else `default()`.
pub fn env_or(key: &str, aliases: &[&str], default: impl FnOnce() -> String) -> String {
    env_optional(key, aliases).unwrap_or_else(default)
}

/// Read `key` (or the first set alias); `None` if none are set or all are empty.
pub fn env_optional(key: &str, aliases: &[&str]) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            aliases
                .iter()
                .find_map(|a| std::env::var(a).ok().filter(|v| !v.trim().is_empty()))
        })
}

/// Read `key` as a bool; accepts "1"/"true"/"yes"/"on" (case-insensitive) as true,
/// "0"/"false"/"no"/"off" as false. Anything else falls back to `default`.
pub fn env_bool(key: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(key, aliases) {
        None => default,
        Some(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
    }
}

/// Read `key` as a `usize`; falls back to `default` on missing or unparsable value.
pub fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read `key` as an `f64`; falls back to `default` on missing or unparsable value.
pub fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
