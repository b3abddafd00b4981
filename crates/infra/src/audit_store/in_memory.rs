use std::sync::RwLock;

use keel_middleware::{AuditLog, AuditStore, AuditStoreError};

/// Append-only in-memory audit store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditLog>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditLog> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn store(&self, log: &AuditLog) -> Result<(), AuditStoreError> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(log.clone());
        Ok(())
    }
}
