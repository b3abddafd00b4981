use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use keel_core::{CommandDescriptor, CommandMetadata, UndoPayload};

use crate::error::BoxError;

/// A discrete business operation the bus can dispatch (command abstraction).
///
/// Commands represent **intent** - a request to change state. The bus only cares
/// about their shape: a unique name, a serializable input and output, and an
/// error type. Domain logic stays inside `execute`.
///
/// ## Reversibility
///
/// `execute` may attach an [`UndoPayload`] to its result. When it does, the
/// history records the invocation as undoable and the bus later hands the same
/// payload back to `undo` / `redo`. Commands that never attach a payload never
/// see those calls, so the default bodies do nothing.
///
/// ## Design Constraints
///
/// Commands are shared across threads once registered (`Send + Sync + 'static`)
/// and are invoked through `&self`; any state they mutate lives behind their own
/// synchronization (usually a repository).
pub trait Command: Send + Sync + 'static {
    type Input: Serialize + DeserializeOwned + Send;
    type Output: Serialize + DeserializeOwned + Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Registry name; unique per bus.
    const NAME: &'static str;

    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::of::<Self::Input, Self::Output>(Self::NAME)
    }

    fn execute(
        &self,
        input: Self::Input,
        metadata: &CommandMetadata,
    ) -> Result<Completion<Self::Output>, Self::Error>;

    /// Reverse the effect recorded in `payload`.
    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), Self::Error> {
        let _ = (payload, metadata);
        Ok(())
    }

    /// Re-apply the effect recorded in `payload` after an undo.
    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), Self::Error> {
        let _ = (payload, metadata);
        Ok(())
    }
}

/// Successful result of a command: its output plus optional undo state.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<O> {
    output: O,
    undo: Option<UndoPayload>,
}

impl<O> Completion<O> {
    /// A result that cannot be undone.
    pub fn new(output: O) -> Self {
        Self { output, undo: None }
    }

    /// A result the history may later undo with `payload`.
    pub fn undoable(output: O, payload: UndoPayload) -> Self {
        Self {
            output,
            undo: Some(payload),
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn undo_payload(&self) -> Option<&UndoPayload> {
        self.undo.as_ref()
    }

    pub fn into_parts(self) -> (O, Option<UndoPayload>) {
        (self.output, self.undo)
    }
}

/// Output of a type-erased invocation that completed.
///
/// The command's effect has happened even when its output failed to encode.
pub type EncodedOutput = Result<JsonValue, serde_json::Error>;

/// Failure of a type-erased invocation. In both cases nothing was applied.
#[derive(Debug)]
pub enum InvocationError {
    /// The JSON input did not match the command's input type.
    Codec(serde_json::Error),
    /// The command itself failed.
    Command(BoxError),
}

impl core::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InvocationError::Codec(e) => write!(f, "input conversion failed: {e}"),
            InvocationError::Command(e) => core::fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvocationError::Codec(e) => Some(e),
            InvocationError::Command(e) => Some(erased(e)),
        }
    }
}

impl InvocationError {
    /// The error middleware should observe: the command's own error when there
    /// is one.
    pub fn as_observed(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            InvocationError::Codec(e) => e,
            InvocationError::Command(e) => erased(e),
        }
    }
}

fn erased(e: &BoxError) -> &(dyn std::error::Error + 'static) {
    &**e
}

/// Object-safe view of a [`Command`] working on JSON values.
///
/// This is what the registry stores. Every `Command` gets it through the blanket
/// impl below.
pub trait DynCommand: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    fn call(
        &self,
        input: JsonValue,
        metadata: &CommandMetadata,
    ) -> Result<Completion<EncodedOutput>, InvocationError>;

    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), BoxError>;

    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), BoxError>;
}

impl<C: Command> DynCommand for C {
    fn descriptor(&self) -> CommandDescriptor {
        Command::descriptor(self)
    }

    fn call(
        &self,
        input: JsonValue,
        metadata: &CommandMetadata,
    ) -> Result<Completion<EncodedOutput>, InvocationError> {
        let input: C::Input = serde_json::from_value(input).map_err(InvocationError::Codec)?;
        let (output, undo) = Command::execute(self, input, metadata)
            .map_err(|e| InvocationError::Command(Box::new(e)))?
            .into_parts();
        Ok(Completion {
            output: serde_json::to_value(output),
            undo,
        })
    }

    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), BoxError> {
        Command::undo(self, payload, metadata).map_err(|e| Box::new(e) as BoxError)
    }

    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), BoxError> {
        Command::redo(self, payload, metadata).map_err(|e| Box::new(e) as BoxError)
    }
}
