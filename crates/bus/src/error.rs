//! Dispatch and history error model.

use thiserror::Error;

use keel_core::CommandId;

use crate::middleware::MiddlewareError;

/// Type-erased error produced by command logic.
///
/// The concrete error survives erasure: use [`BusError::command_error`] to get
/// it back.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which history stack an operation expected an entry on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stack {
    Undo,
    Redo,
}

impl core::fmt::Display for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Stack::Undo => f.write_str("undo"),
            Stack::Redo => f.write_str("redo"),
        }
    }
}

/// Command history error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The configured capacity was zero.
    #[error("history capacity must be a positive integer")]
    ZeroCapacity,

    /// A move was requested for an entry that is not on the source stack.
    ///
    /// This is a caller bug (e.g. undoing a command that was already undone).
    #[error("history desync: command {command_id} is not on the {expected} stack")]
    Desync {
        command_id: CommandId,
        expected: Stack,
    },
}

/// Command bus error.
///
/// ## Error categories
///
/// - **Configuration**: `DuplicateCommand` (registration time)
/// - **Dispatch**: `UnknownCommand`, `ExecutionBlocked`, `MiddlewareFailure`
/// - **Command**: `CommandExecution` (the command's own error, kept as `source`), `Codec`
/// - **Output**: `OutputCodec` (the command's effect stands)
/// - **History**: `History`, `HistoryDisabled`, `NothingToUndo`, `NothingToRedo`
#[derive(Debug, Error)]
pub enum BusError {
    #[error("command '{name}' is already registered")]
    DuplicateCommand { name: String },

    #[error("unknown command: '{name}'")]
    UnknownCommand { name: String },

    /// A before-hook vetoed the invocation; the command did not run.
    #[error("command '{command}' blocked by middleware '{middleware}': {reason}")]
    ExecutionBlocked {
        command: String,
        middleware: String,
        reason: String,
    },

    /// A before-hook returned an error; the command did not run.
    #[error("middleware '{middleware}' failed before command '{command}': {source}")]
    MiddlewareFailure {
        command: String,
        middleware: String,
        #[source]
        source: MiddlewareError,
    },

    /// The command logic failed.
    #[error("command '{command}' failed: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: BoxError,
    },

    /// The input could not be converted to the command's input type; the
    /// command did not run.
    #[error("command '{command}' input conversion failed: {source}")]
    Codec {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The command completed (after-hooks ran, history recorded it) but its
    /// output could not be converted for the caller.
    #[error("command '{command}' completed but its output conversion failed: {source}")]
    OutputCodec {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("command history is disabled")]
    HistoryDisabled,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

impl BusError {
    /// The command's own error, if this is a `CommandExecution` failure of type `E`.
    pub fn command_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            BusError::CommandExecution { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Name of the middleware that stopped the invocation, if any.
    pub fn blocking_middleware(&self) -> Option<&str> {
        match self {
            BusError::ExecutionBlocked { middleware, .. }
            | BusError::MiddlewareFailure { middleware, .. } => Some(middleware),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::DomainError;

    #[test]
    fn command_error_downcasts_to_root_cause() {
        let err = BusError::CommandExecution {
            command: "RegisterUser".into(),
            source: Box::new(DomainError::conflict("email taken")),
        };

        assert_eq!(
            err.command_error::<DomainError>(),
            Some(&DomainError::Conflict("email taken".into()))
        );
        assert!(err.command_error::<std::io::Error>().is_none());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn blocking_middleware_names_vetoer() {
        let err = BusError::ExecutionBlocked {
            command: "RegisterUser".into(),
            middleware: "validation".into(),
            reason: "email: must not be empty".into(),
        };
        assert_eq!(err.blocking_middleware(), Some("validation"));
        assert!(BusError::NothingToUndo.blocking_middleware().is_none());
    }
}
