//! User storage abstraction.
//!
//! Commands only talk to [`UserRepository`]. The in-memory implementation is
//! what tests and the bootstrap use; a database-backed one plugs in behind the
//! same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keel_core::{DomainError, DomainResult, UserId};

use crate::user::User;

pub trait UserRepository: Send + Sync {
    fn get(&self, id: UserId) -> Option<User>;

    /// Lookup by normalized email.
    fn find_by_email(&self, email: &str) -> Option<User>;

    /// Add a new user. Fails with `Conflict` on a duplicate id or email.
    fn insert(&self, user: User) -> DomainResult<()>;

    /// Replace an existing user. Fails with `NotFound` if absent and with
    /// `Conflict` if the new email belongs to someone else.
    fn update(&self, user: User) -> DomainResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> UserRepository for Arc<R>
where
    R: UserRepository + ?Sized,
{
    fn get(&self, id: UserId) -> Option<User> {
        (**self).get(id)
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        (**self).find_by_email(email)
    }

    fn insert(&self, user: User) -> DomainResult<()> {
        (**self).insert(user)
    }

    fn update(&self, user: User) -> DomainResult<()> {
        (**self).update(user)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// In-memory repository backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(users: &HashMap<UserId, User>, email: &str, except: Option<UserId>) -> bool {
        users
            .values()
            .any(|u| u.profile.email == email && Some(u.id) != except)
    }
}

impl UserRepository for InMemoryUserRepository {
    fn get(&self, id: UserId) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .find(|u| u.profile.email == email)
            .cloned()
    }

    fn insert(&self, user: User) -> DomainResult<()> {
        let mut users = self
            .users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if users.contains_key(&user.id) {
            return Err(DomainError::conflict(format!("user {} already exists", user.id)));
        }
        if Self::email_taken(&users, &user.profile.email, None) {
            return Err(DomainError::conflict("email already registered"));
        }
        users.insert(user.id, user);
        Ok(())
    }

    fn update(&self, user: User) -> DomainResult<()> {
        let mut users = self
            .users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !users.contains_key(&user.id) {
            return Err(DomainError::not_found(format!("user {}", user.id)));
        }
        if Self::email_taken(&users, &user.profile.email, Some(user.id)) {
            return Err(DomainError::conflict("email already registered"));
        }
        users.insert(user.id, user);
        Ok(())
    }

    fn len(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
