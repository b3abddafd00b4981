//! Structured logging around every command invocation.
//!
//! Emits three `tracing` events, all carrying `command` and `command_id`:
//!
//! ```text
//! before   → info  "command started"    (+ user_id, timestamp, input_size)
//! after    → info  "command completed"  (+ duration_ms, success)
//! on_error → error "command failed"     (+ duration_ms, error, causes)
//! ```
//!
//! Inputs are never logged verbatim; only their serialized size is.

use std::time::Duration;

use serde_json::Value as JsonValue;

use keel_bus::{Invocation, Middleware, MiddlewareError, Verdict};

/// Logs command lifecycle events. Never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub const NAME: &'static str = "logging";

    pub fn new() -> Self {
        Self
    }
}

fn user_field(invocation: &Invocation<'_>) -> String {
    invocation
        .metadata()
        .user_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// `success` field of an object output; anything else counts as success.
fn reported_success(output: &JsonValue) -> bool {
    output
        .get("success")
        .and_then(JsonValue::as_bool)
        .unwrap_or(true)
}

fn cause_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes.join(": ")
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn before(&self, invocation: &Invocation<'_>) -> Result<Verdict, MiddlewareError> {
        let metadata = invocation.metadata();
        tracing::info!(
            command = %invocation.command_name(),
            command_id = %metadata.command_id(),
            user_id = %user_field(invocation),
            timestamp = %metadata.timestamp().to_rfc3339(),
            input_size = invocation.input().to_string().len(),
            "command started"
        );
        Ok(Verdict::Proceed)
    }

    fn after(
        &self,
        invocation: &Invocation<'_>,
        output: &JsonValue,
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        tracing::info!(
            command = %invocation.command_name(),
            command_id = %invocation.metadata().command_id(),
            duration_ms = duration_ms(elapsed),
            success = reported_success(output),
            "command completed"
        );
        Ok(())
    }

    fn on_error(
        &self,
        invocation: &Invocation<'_>,
        error: &(dyn std::error::Error + 'static),
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        tracing::error!(
            command = %invocation.command_name(),
            command_id = %invocation.metadata().command_id(),
            duration_ms = duration_ms(elapsed),
            error = %error,
            causes = %cause_chain(error),
            "command failed"
        );
        Ok(())
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
