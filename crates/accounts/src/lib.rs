//! `keel-accounts` — user account commands for the command bus.
//!
//! Storage and password hashing are collaborators reached through narrow
//! traits ([`UserRepository`], [`PasswordHasher`]); this crate only decides
//! what each command does and how it is reversed.

pub mod commands;
pub mod password;
pub mod repository;
pub mod schemas;
pub mod user;

pub use commands::{
    AccountError, ChangePassword, ChangePasswordInput, DeactivateUser, DeactivateUserInput,
    PasswordChanged, RegisterUser, RegisterUserInput, UpdateProfile, UpdateProfileInput,
    register_all,
};
pub use password::{FingerprintHasher, PasswordHasher};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use schemas::install_schemas;
pub use user::{Profile, User, UserStatus, UserView};
