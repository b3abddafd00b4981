//! Password hashing seam.
//!
//! Credential hashing is owned by whoever wires the accounts crate up. The
//! commands only ever see a [`PasswordHasher`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;

    fn verify(&self, password: &str, hash: &str) -> bool {
        self.hash(password) == hash
    }
}

impl<H> PasswordHasher for Arc<H>
where
    H: PasswordHasher + ?Sized,
{
    fn hash(&self, password: &str) -> String {
        (**self).hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        (**self).verify(password, hash)
    }
}

/// Non-cryptographic fingerprint for tests and local development.
///
/// Stable only within one process; never use it for stored credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintHasher;

impl PasswordHasher for FingerprintHasher {
    fn hash(&self, password: &str) -> String {
        let mut hasher = DefaultHasher::new();
        password.hash(&mut hasher);
        format!("fp:{:016x}", hasher.finish())
    }
}
