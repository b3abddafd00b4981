//! Durable audit record stores.
//!
//! Both stores implement `keel_middleware::AuditStore`, the single outbound
//! operation the audit middleware needs. Records arrive already sanitized.

pub mod in_memory;
pub mod jsonl;

pub use in_memory::InMemoryAuditStore;
pub use jsonl::JsonlAuditStore;
