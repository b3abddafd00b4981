//! Building a configured command core.
//!
//! ## Assembly
//!
//! ```text
//! CommandCore::from_config(&config)
//!   ↓
//! 1. config.validate()
//!   ↓
//! 2. History (enable_history → CommandHistory::new(max_history_size))
//!   ↓
//! 3. Middleware in fixed order, each only when enabled:
//!      Logging → Validation → Audit (+ JsonlAuditStore when audit_log_path is set)
//!   ↓
//! 4. Register commands on bus_mut()
//!   ↓
//! 5. into_shared() → Arc<CommandBus> for concurrent dispatch
//! ```
//!
//! Validation and audit middleware are registered as `Arc`s, so the handles
//! kept here stay usable (schema registration, reading the audit trail) after
//! the bus is shared.

use std::sync::Arc;

use thiserror::Error;

use keel_accounts::{PasswordHasher, UserRepository};
use keel_bus::{BusError, CommandBus, CommandHistory, HistoryError};
use keel_middleware::{AuditMiddleware, AuditStoreError, LoggingMiddleware, ValidationMiddleware};

use crate::audit_store::JsonlAuditStore;
use crate::config::{ConfigError, CoreConfig};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("history: {0}")]
    History(#[from] HistoryError),

    #[error("audit store: {0}")]
    AuditStore(#[from] AuditStoreError),

    #[error("command registration: {0}")]
    Registration(#[from] BusError),
}

/// Bus plus handles to its configurable parts, still open for registration.
#[derive(Debug)]
pub struct CommandCore {
    bus: CommandBus,
    history: Option<Arc<CommandHistory>>,
    validation: Option<Arc<ValidationMiddleware>>,
    audit: Option<Arc<AuditMiddleware>>,
}

impl CommandCore {
    pub fn from_config(config: &CoreConfig) -> Result<Self, BootstrapError> {
        config.validate()?;

        let history = if config.enable_history {
            Some(Arc::new(CommandHistory::new(config.max_history_size)?))
        } else {
            None
        };
        let mut bus = match &history {
            Some(history) => CommandBus::with_history(history.clone()),
            None => CommandBus::new(),
        };

        if config.enable_logging {
            bus.use_middleware(LoggingMiddleware::new());
        }

        let validation = config.enable_validation.then(|| {
            let validation = Arc::new(ValidationMiddleware::new());
            bus.use_middleware(validation.clone());
            validation
        });

        let audit = if config.enable_audit {
            let audit = match &config.audit_log_path {
                Some(path) => {
                    Arc::new(AuditMiddleware::with_store(Arc::new(JsonlAuditStore::open(path)?)))
                }
                None => Arc::new(AuditMiddleware::new()),
            };
            bus.use_middleware(audit.clone());
            Some(audit)
        } else {
            None
        };

        tracing::info!(
            history = ?history.as_ref().map(|h| h.max_size()),
            middleware = ?bus.middleware_names(),
            durable_audit = config.enable_audit && config.audit_log_path.is_some(),
            "command core assembled"
        );

        Ok(Self {
            bus,
            history,
            validation,
            audit,
        })
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    /// For registering commands before the bus is shared.
    pub fn bus_mut(&mut self) -> &mut CommandBus {
        &mut self.bus
    }

    pub fn history(&self) -> Option<&Arc<CommandHistory>> {
        self.history.as_ref()
    }

    pub fn validation(&self) -> Option<&Arc<ValidationMiddleware>> {
        self.validation.as_ref()
    }

    pub fn audit(&self) -> Option<&Arc<AuditMiddleware>> {
        self.audit.as_ref()
    }

    /// Register the account commands and, when validation is enabled, their
    /// input schemas.
    pub fn register_accounts(
        &mut self,
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<(), BootstrapError> {
        keel_accounts::register_all(&mut self.bus, users, hasher)?;
        if let Some(validation) = &self.validation {
            keel_accounts::install_schemas(validation);
        }
        Ok(())
    }

    /// Freeze registration and share the bus.
    pub fn into_shared(self) -> SharedCommandCore {
        SharedCommandCore {
            bus: Arc::new(self.bus),
            history: self.history,
            validation: self.validation,
            audit: self.audit,
        }
    }
}

/// Shareable, dispatch-only view of a [`CommandCore`].
#[derive(Debug, Clone)]
pub struct SharedCommandCore {
    pub bus: Arc<CommandBus>,
    pub history: Option<Arc<CommandHistory>>,
    pub validation: Option<Arc<ValidationMiddleware>>,
    pub audit: Option<Arc<AuditMiddleware>>,
}
