//! Environment variable overrides.
//!
//! Config structs start from compiled-in defaults and let `RINGSIDE_*`
//! variables override individual fields:
//!
//! ```ignore
//! use ringside_core::env::{env_get, env_flag};
//!
//! let entries: u32 = env_get("RINGSIDE_SQ_ENTRIES", 256);
//! let iopoll = env_flag("RINGSIDE_IOPOLL", false);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`; unset or unparsable values give `default`.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if it is set and valid.
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean switch. "1", "true", "yes", "on" enable; "0", "false", "no",
/// "off" disable; anything else (or unset) keeps `default`.
#[inline]
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
