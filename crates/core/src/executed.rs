//! Records of completed command invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::id::{CommandId, UserId};
use crate::metadata::CommandMetadata;

/// Opaque state a command keeps in order to reverse (and re-apply) its effect.
///
/// Only the command that produced it interprets the payload. The bus and the
/// history move it around untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoPayload {
    /// Tag chosen by the owning command (usually the command name or a variant).
    kind: String,
    data: JsonValue,
}

impl UndoPayload {
    pub fn new(kind: impl Into<String>, data: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Build a payload from a typed value.
    pub fn from_typed<T: Serialize>(
        kind: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(value)?))
    }

    /// Decode the payload back into the type the owning command stored.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }
}

/// Historical record of one successful invocation.
///
/// A record is undoable exactly when the command supplied an [`UndoPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedCommand {
    command_name: String,
    metadata: CommandMetadata,
    /// Completion time (the invocation start time lives in `metadata`).
    timestamp: DateTime<Utc>,
    undoable: bool,
    payload: Option<UndoPayload>,
}

impl ExecutedCommand {
    pub fn new(
        command_name: impl Into<String>,
        metadata: CommandMetadata,
        completed_at: DateTime<Utc>,
        payload: Option<UndoPayload>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            metadata,
            timestamp: completed_at,
            undoable: payload.is_some(),
            payload,
        }
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    pub fn command_id(&self) -> CommandId {
        self.metadata.command_id()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.metadata.user_id()
    }

    pub fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_undoable(&self) -> bool {
        self.undoable
    }

    pub fn payload(&self) -> Option<&UndoPayload> {
        self.payload.as_ref()
    }
}
