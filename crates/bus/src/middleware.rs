//! Middleware contract: cross-cutting hooks around command execution.
//!
//! A middleware is a capability with three independently optional hooks. A hook
//! a middleware does not care about keeps the default no-op body, so the bus
//! never has to check for absent hooks.
//!
//! ## Ordering
//!
//! All three hooks run in **registration order**. This is not an onion: the
//! first registered middleware also runs its `after` / `on_error` first.
//!
//! ## Failure semantics
//!
//! - `before` returning `Ok(Verdict::Block { .. })` vetoes the invocation.
//! - `before` returning `Err(..)` also stops the invocation, but is reported to
//!   the caller as a distinct `MiddlewareFailure`.
//! - Errors from `after` and `on_error` are logged by the bus and never reach
//!   the caller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

use keel_core::{CommandDescriptor, CommandMetadata};

use crate::error::BoxError;

/// What a middleware sees of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    descriptor: &'a CommandDescriptor,
    input: &'a JsonValue,
    metadata: &'a CommandMetadata,
}

impl<'a> Invocation<'a> {
    pub fn new(
        descriptor: &'a CommandDescriptor,
        input: &'a JsonValue,
        metadata: &'a CommandMetadata,
    ) -> Self {
        Self {
            descriptor,
            input,
            metadata,
        }
    }

    pub fn descriptor(&self) -> &'a CommandDescriptor {
        self.descriptor
    }

    pub fn command_name(&self) -> &'a str {
        self.descriptor.name()
    }

    pub fn input(&self) -> &'a JsonValue {
        self.input
    }

    pub fn metadata(&self) -> &'a CommandMetadata {
        self.metadata
    }
}

/// Outcome of a before-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Block { reason: String },
}

impl Verdict {
    pub fn block(reason: impl Into<String>) -> Self {
        Verdict::Block {
            reason: reason.into(),
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, Verdict::Proceed)
    }
}

/// A hook failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MiddlewareError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl MiddlewareError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Cross-cutting interceptor run by the `CommandBus`.
pub trait Middleware: Send + Sync {
    /// Stable name, reported when this middleware blocks an invocation.
    fn name(&self) -> &str;

    /// Runs before the command. May veto.
    fn before(&self, invocation: &Invocation<'_>) -> Result<Verdict, MiddlewareError> {
        let _ = invocation;
        Ok(Verdict::Proceed)
    }

    /// Runs after the command succeeded. `elapsed` covers the command logic only.
    fn after(
        &self,
        invocation: &Invocation<'_>,
        output: &JsonValue,
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        let _ = (invocation, output, elapsed);
        Ok(())
    }

    /// Runs after the command failed, with the command's own error.
    fn on_error(
        &self,
        invocation: &Invocation<'_>,
        error: &(dyn std::error::Error + 'static),
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        let _ = (invocation, error, elapsed);
        Ok(())
    }
}

impl<M> Middleware for Arc<M>
where
    M: Middleware + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn before(&self, invocation: &Invocation<'_>) -> Result<Verdict, MiddlewareError> {
        (**self).before(invocation)
    }

    fn after(
        &self,
        invocation: &Invocation<'_>,
        output: &JsonValue,
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        (**self).after(invocation, output, elapsed)
    }

    fn on_error(
        &self,
        invocation: &Invocation<'_>,
        error: &(dyn std::error::Error + 'static),
        elapsed: Duration,
    ) -> Result<(), MiddlewareError> {
        (**self).on_error(invocation, error, elapsed)
    }
}
