//! Account commands.
//!
//! | command          | undoable | undo                     | redo                   |
//! |------------------|----------|--------------------------|------------------------|
//! | `RegisterUser`   | yes      | withdraw the user        | reactivate             |
//! | `UpdateProfile`  | yes      | restore previous profile | apply new profile      |
//! | `ChangePassword` | no       |                          |                        |
//! | `DeactivateUser` | yes      | reactivate               | deactivate again       |
//!
//! Undo payloads carry ids and profiles only, never credential material. A
//! withdrawn registration keeps its record, so redo restores the account with
//! whatever password it had at undo time.
//!
//! Input field names are camelCase on the wire, so credential fields
//! (`password`, `currentPassword`, `newPassword`) match the audit denylist.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use keel_bus::{BusError, Command, CommandBus, Completion, DynCommand};
use keel_core::{CommandMetadata, DomainError, UndoPayload, UserId};

use crate::password::PasswordHasher;
use crate::repository::UserRepository;
use crate::user::{Profile, User, UserStatus, UserView};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("undo payload is unreadable: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Register every account command on `bus`, sharing one repository and hasher.
pub fn register_all(
    bus: &mut CommandBus,
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
) -> Result<(), BusError> {
    bus.register_many([
        Arc::new(RegisterUser::new(users.clone(), hasher.clone())) as Arc<dyn DynCommand>,
        Arc::new(UpdateProfile::new(users.clone())),
        Arc::new(ChangePassword::new(users.clone(), hasher)),
        Arc::new(DeactivateUser::new(users)),
    ])
}

fn load(users: &dyn UserRepository, id: UserId) -> Result<User, DomainError> {
    users
        .get(id)
        .ok_or_else(|| DomainError::not_found(format!("user {id}")))
}

fn set_status(
    users: &dyn UserRepository,
    id: UserId,
    status: UserStatus,
    metadata: &CommandMetadata,
) -> Result<User, AccountError> {
    let mut user = load(users, id)?;
    user.status = status;
    user.updated_at = metadata.timestamp();
    users.update(user.clone())?;
    Ok(user)
}

// ─────────────────────────────────────────────────────────────────────────────
// RegisterUser
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserInput {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

pub struct RegisterUser {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl RegisterUser {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }
}

impl Command for RegisterUser {
    type Input = RegisterUserInput;
    type Output = UserView;
    type Error = AccountError;

    const NAME: &'static str = "RegisterUser";

    fn execute(
        &self,
        input: RegisterUserInput,
        metadata: &CommandMetadata,
    ) -> Result<Completion<UserView>, AccountError> {
        let profile = Profile::normalized(&input.email, &input.display_name)?;
        if input.password.is_empty() {
            return Err(DomainError::validation("password cannot be empty").into());
        }
        if self.users.find_by_email(&profile.email).is_some() {
            return Err(DomainError::conflict("email already registered").into());
        }

        let user = User::new(
            UserId::new(),
            profile,
            self.hasher.hash(&input.password),
            metadata.timestamp(),
        );
        self.users.insert(user.clone())?;
        tracing::info!(user_id = %user.id, "user registered");

        let payload = UndoPayload::from_typed(Self::NAME, &user.id)?;
        Ok(Completion::undoable(user.view(), payload))
    }

    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        set_status(self.users.as_ref(), payload.decode()?, UserStatus::Withdrawn, metadata)?;
        Ok(())
    }

    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        set_status(self.users.as_ref(), payload.decode()?, UserStatus::Active, metadata)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UpdateProfile
// ─────────────────────────────────────────────────────────────────────────────

/// Absent fields keep their current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileChange {
    user_id: UserId,
    before: Profile,
    after: Profile,
}

pub struct UpdateProfile {
    users: Arc<dyn UserRepository>,
}

impl UpdateProfile {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    fn set_profile(
        &self,
        id: UserId,
        profile: Profile,
        metadata: &CommandMetadata,
    ) -> Result<User, AccountError> {
        let mut user = load(self.users.as_ref(), id)?;
        user.profile = profile;
        user.updated_at = metadata.timestamp();
        self.users.update(user.clone())?;
        Ok(user)
    }
}

impl Command for UpdateProfile {
    type Input = UpdateProfileInput;
    type Output = UserView;
    type Error = AccountError;

    const NAME: &'static str = "UpdateProfile";

    fn execute(
        &self,
        input: UpdateProfileInput,
        metadata: &CommandMetadata,
    ) -> Result<Completion<UserView>, AccountError> {
        let current = load(self.users.as_ref(), input.user_id)?;
        current.ensure_active()?;

        let after = Profile::normalized(
            input.email.as_deref().unwrap_or(&current.profile.email),
            input
                .display_name
                .as_deref()
                .unwrap_or(&current.profile.display_name),
        )?;
        let change = ProfileChange {
            user_id: current.id,
            before: current.profile.clone(),
            after: after.clone(),
        };

        let user = self.set_profile(current.id, after, metadata)?;
        let payload = UndoPayload::from_typed(Self::NAME, &change)?;
        Ok(Completion::undoable(user.view(), payload))
    }

    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        let change: ProfileChange = payload.decode()?;
        self.set_profile(change.user_id, change.before, metadata)?;
        Ok(())
    }

    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        let change: ProfileChange = payload.decode()?;
        self.set_profile(change.user_id, change.after, metadata)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChangePassword
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub user_id: UserId,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub success: bool,
}

/// Not undoable: the previous credential is never kept.
pub struct ChangePassword {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl ChangePassword {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }
}

impl Command for ChangePassword {
    type Input = ChangePasswordInput;
    type Output = PasswordChanged;
    type Error = AccountError;

    const NAME: &'static str = "ChangePassword";

    fn execute(
        &self,
        input: ChangePasswordInput,
        metadata: &CommandMetadata,
    ) -> Result<Completion<PasswordChanged>, AccountError> {
        let mut user = load(self.users.as_ref(), input.user_id)?;
        user.ensure_active()?;

        if !self
            .hasher
            .verify(&input.current_password, &user.password_hash)
        {
            return Err(DomainError::Unauthorized.into());
        }
        if input.new_password.is_empty() {
            return Err(DomainError::validation("new password cannot be empty").into());
        }
        if input.new_password == input.current_password {
            return Err(DomainError::validation("new password must differ from the current one").into());
        }

        user.password_hash = self.hasher.hash(&input.new_password);
        user.updated_at = metadata.timestamp();
        self.users.update(user)?;
        tracing::info!(user_id = %input.user_id, "password changed");

        Ok(Completion::new(PasswordChanged { success: true }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DeactivateUser
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateUserInput {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct DeactivateUser {
    users: Arc<dyn UserRepository>,
}

impl DeactivateUser {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

impl Command for DeactivateUser {
    type Input = DeactivateUserInput;
    type Output = UserView;
    type Error = AccountError;

    const NAME: &'static str = "DeactivateUser";

    fn execute(
        &self,
        input: DeactivateUserInput,
        metadata: &CommandMetadata,
    ) -> Result<Completion<UserView>, AccountError> {
        load(self.users.as_ref(), input.user_id)?.ensure_active()?;

        let user = set_status(self.users.as_ref(), input.user_id, UserStatus::Deactivated, metadata)?;
        tracing::info!(
            user_id = %user.id,
            reason = input.reason.as_deref().unwrap_or(""),
            "user deactivated"
        );

        let payload = UndoPayload::from_typed(Self::NAME, &user.id)?;
        Ok(Completion::undoable(user.view(), payload))
    }

    fn undo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        set_status(self.users.as_ref(), payload.decode()?, UserStatus::Active, metadata)?;
        Ok(())
    }

    fn redo(&self, payload: &UndoPayload, metadata: &CommandMetadata) -> Result<(), AccountError> {
        set_status(self.users.as_ref(), payload.decode()?, UserStatus::Deactivated, metadata)?;
        Ok(())
    }
}
