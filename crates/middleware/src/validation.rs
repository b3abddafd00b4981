//! Input validation against per-command schemas.
//!
//! Schemas are keyed by command name and may be registered at any time, also
//! after the middleware has been handed to the bus. Invocations of a command
//! with no schema proceed unchecked (logged at debug so the gap is visible).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keel_bus::{Invocation, Middleware, MiddlewareError, Verdict};

use crate::schema::{Schema, ValidationIssue};

/// Vetoes invocations whose input fails the command's schema.
#[derive(Default)]
pub struct ValidationMiddleware {
    schemas: RwLock<HashMap<String, Arc<dyn Schema>>>,
}

impl core::fmt::Debug for ValidationMiddleware {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValidationMiddleware")
            .field("commands", &self.registered_commands())
            .finish()
    }
}

impl ValidationMiddleware {
    pub const NAME: &'static str = "validation";

    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the schema for `command`.
    pub fn register_schema(&self, command: impl Into<String>, schema: impl Schema + 'static) {
        let command = command.into();
        tracing::debug!(command = %command, "validation schema registered");
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(command, Arc::new(schema));
    }

    pub fn has_schema(&self, command: &str) -> bool {
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(command)
    }

    /// Command names with a schema, sorted.
    pub fn registered_commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn schema_for(&self, command: &str) -> Option<Arc<dyn Schema>> {
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(command)
            .cloned()
    }
}

fn describe(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn before(&self, invocation: &Invocation<'_>) -> Result<Verdict, MiddlewareError> {
        let Some(schema) = self.schema_for(invocation.command_name()) else {
            tracing::debug!(
                command = %invocation.command_name(),
                "no validation schema; input not checked"
            );
            return Ok(Verdict::Proceed);
        };

        match schema.validate(invocation.input()) {
            Ok(()) => Ok(Verdict::Proceed),
            Err(issues) => {
                let reason = describe(&issues);
                tracing::warn!(
                    command = %invocation.command_name(),
                    command_id = %invocation.metadata().command_id(),
                    issues = %reason,
                    "input validation failed"
                );
                Ok(Verdict::block(reason))
            }
        }
    }
}
