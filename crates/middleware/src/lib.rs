//! `keel-middleware` — built-in middleware for the command bus.
//!
//! - [`LoggingMiddleware`]: structured start/completion/failure events
//! - [`ValidationMiddleware`]: per-command input schemas, vetoes invalid input
//! - [`AuditMiddleware`]: sanitized audit trail, in memory and optionally durable
//!
//! None of them depend on each other; the bus registration order decides how
//! their effects interleave.

pub mod audit;
pub mod logging;
pub mod sanitize;
pub mod schema;
pub mod validation;

pub use audit::{AuditLog, AuditMiddleware, AuditOutcome, AuditStore, AuditStoreError};
pub use logging::LoggingMiddleware;
pub use sanitize::{REDACTED, SENSITIVE_FIELDS, sanitize};
pub use schema::{FieldRule, ObjectSchema, Schema, ValidationIssue};
pub use validation::ValidationMiddleware;
