//! Logging infrastructure for Loam.
//!
//! Structured logging controlled by environment variables:
//!
//! - `LOAM_DEBUG=true` - Enable debug logging
//! - `LOAM_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `LOAM_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! Within Loam, the standard tracing macros are used:
//!
//! ```rust,ignore
//! use tracing::{debug, warn};
//!
//! debug!(sql = %expr.sql, "executing query");
//! warn!(path = %path, "no schema at preload level");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `LOAM_DEBUG`.
///
/// Returns `true` if `LOAM_DEBUG` is set to "true", "1", or "yes"
/// (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("LOAM_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `LOAM_LOG_LEVEL`.
///
/// Defaults to "debug" if `LOAM_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    if let Ok(level) = env::var("LOAM_LOG_LEVEL") {
        match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => {
                if is_debug_enabled() {
                    "debug"
                } else {
                    "warn"
                }
            }
        }
    } else if is_debug_enabled() {
        "debug"
    } else {
        "warn"
    }
}

/// Get the configured log format from `LOAM_LOG_FORMAT`.
///
/// Defaults to "json" for structured logging.
pub fn get_log_format() -> &'static str {
    env::var("LOAM_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the Loam logging system.
///
/// This should be called once at application startup. Subsequent calls are
/// no-ops, as is the first call when no logging was requested through the
/// environment.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("LOAM_LOG_LEVEL").is_err() {
            return;
        }

        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = get_log_level();
        let filter = EnvFilter::try_new(format!("loam={},loam_query={}", level, level))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        match get_log_format() {
            "json" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }

        tracing::info!(level = level, format = get_log_format(), "Loam logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_json() {
        // Only meaningful when the variable is unset in the test environment.
        if env::var("LOAM_LOG_FORMAT").is_err() {
            assert_eq!(get_log_format(), "json");
        }
    }
}
