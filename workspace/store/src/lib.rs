//! Account store: creation, credential handling and login sessions for the
//! `users` table.

pub mod error;
pub mod manager;
pub mod password;
pub mod sessions;
pub mod validation;

pub use error::{FieldErrors, Result, StoreError};
pub use manager::{AccountManager, ExtraFields};
pub use password::{Argon2Hasher, PasswordHasher};
pub use sessions::SessionStore;
