//! Built-in client defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde_json::{json, Value};

/// Per-request HTTP timeout in seconds
pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// HTTP connection timeout in seconds
pub const CONNECT_TIMEOUT_SECONDS: u64 = 15;

/// Retries of transient HTTP failures
pub const MAX_RETRIES: u32 = 3;

pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
pub const RETRY_MAX_DELAY_MS: u64 = 10_000;

/// First run-state poll interval in milliseconds
pub const POLL_INITIAL_INTERVAL_MS: u64 = 1_000;

/// Poll backoff cap in milliseconds
pub const POLL_MAX_INTERVAL_MS: u64 = 10_000;

/// Create/update deadline in seconds (30 minutes)
pub const RESOURCE_TIMEOUT_SECONDS: u64 = 1_800;

pub const LOG_LEVEL: &str = "info";
pub const LOG_FORMAT: &str = "compact";

/// Built-in defaults as a merge layer
pub fn builtin_layer() -> Value {
    json!({
        "http": {
            "request_timeout_seconds": REQUEST_TIMEOUT_SECONDS,
            "connect_timeout_seconds": CONNECT_TIMEOUT_SECONDS,
            "max_retries": MAX_RETRIES,
            "retry_initial_delay_ms": RETRY_INITIAL_DELAY_MS,
            "retry_max_delay_ms": RETRY_MAX_DELAY_MS
        },
        "poll": {
            "initial_interval_ms": POLL_INITIAL_INTERVAL_MS,
            "max_interval_ms": POLL_MAX_INTERVAL_MS
        },
        "timeouts": {
            "create_seconds": RESOURCE_TIMEOUT_SECONDS,
            "update_seconds": RESOURCE_TIMEOUT_SECONDS
        },
        "logging": {
            "level": LOG_LEVEL,
            "format": LOG_FORMAT
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layer() {
        let value = builtin_layer();
        assert_eq!(value["timeouts"]["create_seconds"], 1800);
        assert_eq!(value["poll"]["initial_interval_ms"], 1000);
        assert_eq!(value["logging"]["format"], "compact");
        assert!(value.get("host").is_none());
    }
}
