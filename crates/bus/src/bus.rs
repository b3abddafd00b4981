//! Command dispatch pipeline.
//!
//! The `CommandBus` is the single point of dispatch for commands. It owns the
//! command registry and the ordered middleware chain, and forwards completed
//! invocations to the shared history.
//!
//! ## Execution Flow
//!
//! ```text
//! execute(name, input, overrides)
//!   ↓
//! 1. Look up the command (unknown name → UnknownCommand, nothing runs)
//!   ↓
//! 2. Build metadata (fresh command id + timestamp, merged with overrides)
//!   ↓
//! 3. before-hooks in registration order (veto → ExecutionBlocked)
//!   ↓
//! 4. Command logic
//!   ├─ Ok  → after-hooks in registration order → decode output → history.add(ExecutedCommand)
//!   └─ Err → on_error-hooks in registration order → original error returned
//! ```
//!
//! After/error hook failures are logged and swallowed: the command's result is
//! authoritative and is never masked by observability or audit problems.
//!
//! Once the command logic returns `Ok` the invocation is committed. An output
//! that cannot be encoded or decoded still runs the after-hooks (seeing `null`
//! when encoding failed) and is still recorded; the caller then gets
//! `OutputCodec`.
//!
//! ## Undo / Redo
//!
//! Reversals go through [`CommandHistory::undo_with`] / [`CommandHistory::redo_with`],
//! which hold the history exclusively from choosing the entry until it has
//! moved. Concurrent undos therefore reverse distinct entries, and a command
//! recorded meanwhile lands after the move. A command's `undo`/`redo` must not
//! dispatch through a bus sharing the same history.
//!
//! ## Registration vs. Dispatch
//!
//! Registering commands and middleware takes `&mut self`; dispatching takes
//! `&self`. Build the bus once at startup, then share it behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value as JsonValue;

use keel_core::{
    CommandDescriptor, CommandMetadata, ExecutedCommand, MetadataOverrides, UndoPayload,
};

use crate::command::{Command, DynCommand, InvocationError};
use crate::error::{BoxError, BusError};
use crate::history::CommandHistory;
use crate::middleware::{Invocation, Middleware, Verdict};

struct Registered {
    descriptor: CommandDescriptor,
    command: Arc<dyn DynCommand>,
}

/// Typed command bus with ordered middleware and optional history.
pub struct CommandBus {
    registry: HashMap<String, Registered>,
    middleware: Vec<Box<dyn Middleware>>,
    history: Option<Arc<CommandHistory>>,
}

impl core::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandBus")
            .field("commands", &self.registry.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware_names())
            .field("history", &self.history)
            .finish()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    /// A bus without history: successful invocations are not recorded.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            middleware: Vec::new(),
            history: None,
        }
    }

    /// A bus recording successful invocations into `history`.
    pub fn with_history(history: Arc<CommandHistory>) -> Self {
        Self {
            history: Some(history),
            ..Self::new()
        }
    }

    pub fn history(&self) -> Option<&Arc<CommandHistory>> {
        self.history.as_ref()
    }

    /// Register a single command.
    pub fn register<C: Command>(&mut self, command: C) -> Result<(), BusError> {
        self.register_many([Arc::new(command) as Arc<dyn DynCommand>])
    }

    /// Register a batch of commands.
    ///
    /// Names must be unique, both against the registry and within the batch. A
    /// batch with any collision is rejected as a whole.
    pub fn register_many(
        &mut self,
        commands: impl IntoIterator<Item = Arc<dyn DynCommand>>,
    ) -> Result<(), BusError> {
        let mut batch: Vec<Registered> = Vec::new();
        for command in commands {
            let descriptor = command.descriptor();
            let name = descriptor.name();
            if self.registry.contains_key(name) || batch.iter().any(|r| r.descriptor.name() == name)
            {
                return Err(BusError::DuplicateCommand {
                    name: name.to_string(),
                });
            }
            batch.push(Registered {
                descriptor,
                command,
            });
        }

        for registered in batch {
            tracing::debug!(command = %registered.descriptor, "command registered");
            self.registry
                .insert(registered.descriptor.name().to_string(), registered);
        }
        Ok(())
    }

    /// Append a middleware to the chain.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    pub fn descriptor(&self, name: &str) -> Option<&CommandDescriptor> {
        self.registry.get(name).map(|r| &r.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.registry.values().map(|r| &r.descriptor)
    }

    /// Middleware names in execution order.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Execute the command registered under `C::NAME` with a typed input.
    pub fn execute<C: Command>(
        &self,
        input: C::Input,
        overrides: MetadataOverrides,
    ) -> Result<C::Output, BusError> {
        let registered = self.lookup(C::NAME)?;
        let input = serde_json::to_value(input).map_err(|source| BusError::Codec {
            command: C::NAME.to_string(),
            source,
        })?;
        self.run(registered, input, overrides, serde_json::from_value::<C::Output>)
    }

    /// Execute the command registered under `name` with a JSON input.
    pub fn dispatch(
        &self,
        name: &str,
        input: JsonValue,
        overrides: MetadataOverrides,
    ) -> Result<JsonValue, BusError> {
        let registered = self.lookup(name)?;
        self.run(registered, input, overrides, Ok)
    }

    fn lookup(&self, name: &str) -> Result<&Registered, BusError> {
        self.registry.get(name).ok_or_else(|| {
            tracing::debug!(command = %name, "dispatch of unknown command");
            BusError::UnknownCommand {
                name: name.to_string(),
            }
        })
    }

    fn run<T>(
        &self,
        registered: &Registered,
        input: JsonValue,
        overrides: MetadataOverrides,
        decode: impl FnOnce(JsonValue) -> Result<T, serde_json::Error>,
    ) -> Result<T, BusError> {
        let metadata = CommandMetadata::generate(overrides);
        let descriptor = &registered.descriptor;
        let invocation = Invocation::new(descriptor, &input, &metadata);

        // 1) before-hooks (first veto or failure wins)
        for middleware in &self.middleware {
            match middleware.before(&invocation) {
                Ok(Verdict::Proceed) => {}
                Ok(Verdict::Block { reason }) => {
                    tracing::debug!(
                        command = %descriptor.name(),
                        command_id = %metadata.command_id(),
                        middleware = %middleware.name(),
                        %reason,
                        "command blocked"
                    );
                    return Err(BusError::ExecutionBlocked {
                        command: descriptor.name().to_string(),
                        middleware: middleware.name().to_string(),
                        reason,
                    });
                }
                Err(source) => {
                    tracing::warn!(
                        command = %descriptor.name(),
                        command_id = %metadata.command_id(),
                        middleware = %middleware.name(),
                        error = %source,
                        "before hook failed"
                    );
                    return Err(BusError::MiddlewareFailure {
                        command: descriptor.name().to_string(),
                        middleware: middleware.name().to_string(),
                        source,
                    });
                }
            }
        }

        // 2) command logic
        let started = Instant::now();
        let result = registered.command.call(input.clone(), &metadata);
        let elapsed = started.elapsed();

        match result {
            Ok(completion) => {
                let (encoded, undo) = completion.into_parts();
                let null = JsonValue::Null;
                let observed = encoded.as_ref().unwrap_or(&null);

                // 3) after-hooks (failures never undo the completed command)
                for middleware in &self.middleware {
                    if let Err(e) = middleware.after(&invocation, observed, elapsed) {
                        tracing::warn!(
                            command = %descriptor.name(),
                            command_id = %metadata.command_id(),
                            middleware = %middleware.name(),
                            error = %e,
                            "after hook failed"
                        );
                    }
                }

                // 4) decode; the effect stands either way
                let output = encoded.and_then(decode).map_err(|source| {
                    tracing::warn!(
                        command = %descriptor.name(),
                        command_id = %metadata.command_id(),
                        error = %source,
                        "command output conversion failed"
                    );
                    BusError::OutputCodec {
                        command: descriptor.name().to_string(),
                        source,
                    }
                });

                // 5) record
                if let Some(history) = &self.history {
                    history.add(ExecutedCommand::new(
                        descriptor.name(),
                        metadata.clone(),
                        Utc::now(),
                        undo,
                    ));
                }

                output
            }
            Err(error) => {
                self.run_error_hooks(&invocation, error.as_observed(), elapsed);
                Err(match error {
                    InvocationError::Codec(source) => BusError::Codec {
                        command: descriptor.name().to_string(),
                        source,
                    },
                    InvocationError::Command(source) => BusError::CommandExecution {
                        command: descriptor.name().to_string(),
                        source,
                    },
                })
            }
        }
    }

    fn run_error_hooks(
        &self,
        invocation: &Invocation<'_>,
        error: &(dyn std::error::Error + 'static),
        elapsed: Duration,
    ) {
        for middleware in &self.middleware {
            if let Err(e) = middleware.on_error(invocation, error, elapsed) {
                tracing::warn!(
                    command = %invocation.command_name(),
                    command_id = %invocation.metadata().command_id(),
                    middleware = %middleware.name(),
                    error = %e,
                    "error hook failed"
                );
            }
        }
    }

    /// Undo the most recent undoable command.
    ///
    /// Calls the owning command's `undo` with the recorded payload and, only if
    /// that succeeds, moves the entry to the redo stack. Returns the entry.
    pub fn undo(&self, overrides: MetadataOverrides) -> Result<ExecutedCommand, BusError> {
        let history = self.history.as_ref().ok_or(BusError::HistoryDisabled)?;
        let entry = history
            .undo_with(|entry| {
                self.reverse(entry, overrides, |command, payload, metadata| {
                    command.undo(payload, metadata)
                })
            })?
            .ok_or(BusError::NothingToUndo)?;

        tracing::info!(
            command = %entry.command_name(),
            command_id = %entry.command_id(),
            "command undone"
        );
        Ok(entry)
    }

    /// Re-apply the most recently undone command.
    pub fn redo(&self, overrides: MetadataOverrides) -> Result<ExecutedCommand, BusError> {
        let history = self.history.as_ref().ok_or(BusError::HistoryDisabled)?;
        let entry = history
            .redo_with(|entry| {
                self.reverse(entry, overrides, |command, payload, metadata| {
                    command.redo(payload, metadata)
                })
            })?
            .ok_or(BusError::NothingToRedo)?;

        tracing::info!(
            command = %entry.command_name(),
            command_id = %entry.command_id(),
            "command redone"
        );
        Ok(entry)
    }

    fn reverse(
        &self,
        entry: &ExecutedCommand,
        overrides: MetadataOverrides,
        op: impl FnOnce(&dyn DynCommand, &UndoPayload, &CommandMetadata) -> Result<(), BoxError>,
    ) -> Result<(), BusError> {
        // undo_with/redo_with only hand over entries that carry a payload.
        let payload = entry.payload().ok_or(BusError::NothingToUndo)?;
        let registered = self.lookup(entry.command_name())?;
        let metadata = CommandMetadata::generate(overrides);
        op(registered.command.as_ref(), payload, &metadata).map_err(|source| {
            BusError::CommandExecution {
                command: entry.command_name().to_string(),
                source,
            }
        })
    }
}
