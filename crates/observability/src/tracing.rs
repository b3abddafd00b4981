//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` when set. Every event the bus
//! and the built-in middleware emit carries `command` and `command_id` fields,
//! so one invocation can be followed across lines.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: `RUST_LOG` if it parses, `fallback` otherwise.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global JSON subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(fallback: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Same format, written through the test harness so output is captured per test.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_test(fallback: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .json()
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}
