//! Audit trail of every completed or failed invocation.
//!
//! ## Record Flow
//!
//! ```text
//! after / on_error
//!   ↓
//! 1. Sanitize input (and output on success)
//!   ↓
//! 2. Build AuditLog (outcome is either output or error, never both)
//!   ↓
//! 3. Append to the in-memory trail (always)
//!   ↓
//! 4. Persist through the AuditStore, when one is configured
//!      └─ store failure → MiddlewareError (logged by the bus)
//! ```
//!
//! The audit middleware never blocks: its `before` hook is the default no-op.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use keel_bus::{Invocation, Middleware, MiddlewareError};
use keel_core::{CommandId, UserId};

use crate::sanitize::sanitize;

/// How an audited invocation ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success { output: JsonValue },
    Failure { error: String },
}

/// One audit record. Input and output are already sanitized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub command_name: String,
    pub command_id: CommandId,
    pub user_id: Option<UserId>,
    pub input: JsonValue,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
    /// When the record was written (after the command finished).
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    fn new(invocation: &Invocation<'_>, outcome: AuditOutcome, elapsed: Duration) -> Self {
        let metadata = invocation.metadata();
        Self {
            command_name: invocation.command_name().to_string(),
            command_id: metadata.command_id(),
            user_id: metadata.user_id(),
            input: sanitize(invocation.input()),
            outcome,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Success { .. })
    }
}

#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("audit store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for audit records.
pub trait AuditStore: Send + Sync {
    fn store(&self, log: &AuditLog) -> Result<(), AuditStoreError>;
}

impl<S> AuditStore for Arc<S>
where
    S: AuditStore + ?Sized,
{
    fn store(&self, log: &AuditLog) -> Result<(), AuditStoreError> {
        (**self).store(log)
    }
}

/// Records a sanitized [`AuditLog`] for every invocation that reached the
/// command logic.
#[derive(Default)]
pub struct AuditMiddleware {
    entries: RwLock<Vec<AuditLog>>,
    store: Option<Arc<dyn AuditStore>>,
}

impl core::fmt::Debug for AuditMiddleware {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditMiddleware")
            .field("entries", &self.len())
            .field("durable", &self.store.is_some())
            .finish()
    }
}

impl AuditMiddleware {
    pub const NAME: &'static str = "audit";

    /// In-memory trail only.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory trail plus durable persistence.
    pub fn with_store(store: Arc<dyn AuditStore>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            store: Some(store),
        }
    }

    /// Snapshot of the in-memory trail, oldest first.
    pub fn entries(&self) -> Vec<AuditLog> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, log: AuditLog) -> Result<(), MiddlewareError> {
        let persisted = match &self.store {
            Some(store) => store.store(&log),
            None => Ok(()),
        };

        tracing::debug!(
            command = %log.command_name,
            command_id = %log.command_id,
            success = log.is_success(),
            "audit record written"
        );
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(log);

        persisted.map_err(|e| MiddlewareError::with_source("audit store write failed", e))
    }
}

impl Middleware for AuditMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn after(
        &self,
        invocation: &Invocation<'_>,
        output: &JsonValue,
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        let outcome = AuditOutcome::Success {
            output: sanitize(output),
        };
        self.record(AuditLog::new(invocation, outcome, elapsed))
    }

    fn on_error(
        &self,
        invocation: &Invocation<'_>,
        error: &(dyn std::error::Error + 'static),
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        let outcome = AuditOutcome::Failure {
            error: error.to_string(),
        };
        self.record(AuditLog::new(invocation, outcome, elapsed))
    }
}
