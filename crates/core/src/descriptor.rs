//! Static description of a command type.

use serde::Serialize;

/// Name plus input/output shape of one command type.
///
/// The name is the registry key and must be unique per bus. The shapes are
/// informational (Rust type names for typed commands) and are carried into logs.
/// Descriptors are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommandDescriptor {
    name: String,
    input_shape: &'static str,
    output_shape: &'static str,
}

impl CommandDescriptor {
    pub fn new(
        name: impl Into<String>,
        input_shape: &'static str,
        output_shape: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            input_shape,
            output_shape,
        }
    }

    /// Describe a command whose input and output are the Rust types `I` and `O`.
    pub fn of<I, O>(name: impl Into<String>) -> Self {
        Self::new(
            name,
            core::any::type_name::<I>(),
            core::any::type_name::<O>(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_shape(&self) -> &'static str {
        self.input_shape
    }

    pub fn output_shape(&self) -> &'static str {
        self.output_shape
    }
}

impl core::fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}({} -> {})", self.name, self.input_shape, self.output_shape)
    }
}
