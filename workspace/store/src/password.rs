//! Password hashing using Argon2

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use std::fmt::Debug;

use crate::error::{Result, StoreError};

/// Prefix marking a stored hash that no password can ever match.
pub const UNUSABLE_PASSWORD_PREFIX: char = '!';

/// One-way password hashing primitive.
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a plaintext password into a self-describing string.
    fn hash(&self, password: &str) -> Result<String>;

    /// Verify a plaintext password against a stored hash.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher with the crate's default parameters.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StoreError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        if hash.starts_with(UNUSABLE_PASSWORD_PREFIX) {
            return false;
        }

        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// A random value that can never be produced by [`PasswordHasher::hash`].
pub fn unusable_password() -> String {
    format!(
        "{}{}",
        UNUSABLE_PASSWORD_PREFIX,
        uuid::Uuid::new_v4().simple()
    )
}
