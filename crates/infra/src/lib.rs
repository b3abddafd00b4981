//! Infrastructure layer: configuration, durable audit stores, bootstrap.
//!
//! Everything here wires the pure crates (`keel-core`, `keel-bus`,
//! `keel-middleware`, `keel-accounts`) into a ready-to-use command core.

pub mod audit_store;
pub mod bootstrap;
pub mod config;

#[cfg(test)]
mod integration_tests;

pub use audit_store::{InMemoryAuditStore, JsonlAuditStore};
pub use bootstrap::{BootstrapError, CommandCore, SharedCommandCore};
pub use config::{ConfigError, CoreConfig};
