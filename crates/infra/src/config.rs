//! Command core configuration.
//!
//! ## Sources
//!
//! ```text
//! CoreConfig::default()        compiled-in defaults
//!   ↓
//! CoreConfig::from_env()       KEEL_* environment variables override defaults
//!   ↓
//! CoreConfig::validate()       rejects unusable combinations
//! ```
//!
//! Unparsable environment values never abort startup: they are reported with
//! `tracing::warn!` and the default is kept.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_ENABLE_HISTORY: &str = "KEEL_ENABLE_HISTORY";
pub const ENV_MAX_HISTORY_SIZE: &str = "KEEL_MAX_HISTORY_SIZE";
pub const ENV_ENABLE_LOGGING: &str = "KEEL_ENABLE_LOGGING";
pub const ENV_ENABLE_VALIDATION: &str = "KEEL_ENABLE_VALIDATION";
pub const ENV_ENABLE_AUDIT: &str = "KEEL_ENABLE_AUDIT";
pub const ENV_AUDIT_LOG_PATH: &str = "KEEL_AUDIT_LOG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_history_size must be at least 1")]
    ZeroHistorySize,

    #[error("audit_log_path is set but empty")]
    EmptyAuditPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Record successful invocations for undo/redo.
    pub enable_history: bool,
    /// Undo stack capacity; the oldest entry is evicted beyond it.
    pub max_history_size: usize,
    pub enable_logging: bool,
    pub enable_validation: bool,
    pub enable_audit: bool,
    /// JSONL file for durable audit records. In-memory only when unset.
    pub audit_log_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enable_history: true,
            max_history_size: Self::DEFAULT_MAX_HISTORY_SIZE,
            enable_logging: true,
            enable_validation: true,
            enable_audit: true,
            audit_log_path: None,
        }
    }
}

impl CoreConfig {
    pub const DEFAULT_MAX_HISTORY_SIZE: usize = 50;

    /// Defaults overridden by `KEEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            enable_history: flag(&lookup, ENV_ENABLE_HISTORY, defaults.enable_history),
            max_history_size: size(&lookup, ENV_MAX_HISTORY_SIZE, defaults.max_history_size),
            enable_logging: flag(&lookup, ENV_ENABLE_LOGGING, defaults.enable_logging),
            enable_validation: flag(&lookup, ENV_ENABLE_VALIDATION, defaults.enable_validation),
            enable_audit: flag(&lookup, ENV_ENABLE_AUDIT, defaults.enable_audit),
            audit_log_path: lookup(ENV_AUDIT_LOG_PATH).map(PathBuf::from),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_history && self.max_history_size == 0 {
            return Err(ConfigError::ZeroHistorySize);
        }
        if self
            .audit_log_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::EmptyAuditPath);
        }
        Ok(())
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(key, value = %raw, default, "unparsable boolean, using default");
            default
        }
    }
}

fn size(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, default, "unparsable size, using default");
        default
    })
}
