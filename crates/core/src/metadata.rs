//! Per-invocation command metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::{CommandId, UserId};

/// Free-form trace fields attached to an invocation (request id, origin, ...).
pub type TraceData = BTreeMap<String, JsonValue>;

/// Context of one command invocation.
///
/// Built fresh by the bus for every dispatch and then only read: every hook of
/// the invocation sees the same value by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMetadata {
    command_id: CommandId,
    user_id: Option<UserId>,
    /// Invocation start time.
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    trace: TraceData,
}

impl CommandMetadata {
    /// Generate metadata for a new invocation, merging caller overrides over
    /// generated defaults (current time, no user, no trace).
    ///
    /// The command id is always fresh; history moves rely on it being unique.
    pub fn generate(overrides: MetadataOverrides) -> Self {
        Self {
            command_id: CommandId::new(),
            user_id: overrides.user_id,
            timestamp: overrides.timestamp.unwrap_or_else(Utc::now),
            trace: overrides.trace,
        }
    }

    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn trace(&self) -> &TraceData {
        &self.trace
    }
}

/// Partial metadata supplied by the caller of `execute`.
///
/// Unset fields are generated by the bus. Trace entries are taken as-is. The
/// command id is not overridable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataOverrides {
    pub user_id: Option<UserId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub trace: TraceData,
}

impl MetadataOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute the invocation to `user_id`.
    pub fn for_user(user_id: UserId) -> Self {
        Self::new().with_user(user_id)
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_trace(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.trace.insert(key.into(), value.into());
        self
    }
}
