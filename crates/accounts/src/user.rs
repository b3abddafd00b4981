//! User account record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keel_core::{DomainError, DomainResult, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Account can be used.
    #[default]
    Active,
    /// Account was switched off; data is kept.
    Deactivated,
    /// Registration was undone. The record and its email stay reserved so the
    /// registration can be redone.
    Withdrawn,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Deactivated => write!(f, "Deactivated"),
            UserStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Editable part of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email: String,
    pub display_name: String,
}

impl Profile {
    /// Trimmed, lowercased email and trimmed display name.
    ///
    /// Fails when either is empty or the email has no `@`.
    pub fn normalized(email: &str, display_name: &str) -> DomainResult<Self> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(Self {
            email,
            display_name: display_name.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// Stored user account.
///
/// # Invariants
/// - `email` is normalized and unique within a repository.
/// - `password_hash` is whatever the configured [`crate::PasswordHasher`]
///   produced; it never holds the raw password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(flatten)]
    pub profile: Profile,
    pub password_hash: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, profile: Profile, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            password_hash,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        match self.status {
            UserStatus::Active => Ok(()),
            UserStatus::Deactivated => Err(DomainError::conflict("user is deactivated")),
            UserStatus::Withdrawn => Err(DomainError::conflict("user registration was withdrawn")),
        }
    }

    /// Public projection (no credential material).
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.profile.email.clone(),
            display_name: self.profile.display_name.clone(),
            status: self.status,
        }
    }
}

/// What commands return about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub status: UserStatus,
}
