//! `keel-core` — command execution primitives.
//!
//! Plain data shared by the bus, the history and the middleware: identifiers,
//! descriptors, per-invocation metadata and executed-command records. No IO,
//! no locking, no logging.

pub mod descriptor;
pub mod error;
pub mod executed;
pub mod id;
pub mod metadata;

pub use descriptor::CommandDescriptor;
pub use error::{DomainError, DomainResult};
pub use executed::{ExecutedCommand, UndoPayload};
pub use id::{CommandId, UserId};
pub use metadata::{CommandMetadata, MetadataOverrides, TraceData};
