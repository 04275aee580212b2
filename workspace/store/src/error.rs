use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error};

/// Field-scoped validation messages, keyed by field name.
///
/// Errors that are not tied to a single field go under
/// [`FieldErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Key used for errors that concern the request as a whole.
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single message on a single field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Appends every message of `other` to this collection.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    /// `Ok(())` when empty, otherwise the collected errors as a [`StoreError`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

/// Error types for the account store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before reaching the database
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// A unique constraint rejected the write
    #[error("Integrity error on {field}: {message}")]
    Integrity { field: String, message: String },

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(sea_orm::DbErr),

    /// Error from the password hashing primitive
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// A configured value cannot be applied
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation(FieldErrors::single(field, message))
    }
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                let field = unique_violation_field(&detail);
                debug!(%field, %detail, "Unique constraint violation");
                StoreError::Integrity {
                    message: format!("A user with that {} already exists.", field.replace('_', " ")),
                    field,
                }
            }
            _ => {
                error!(%error, "Database error");
                StoreError::Database(error)
            }
        }
    }
}

/// Picks the offending column out of a driver's unique-violation message.
///
/// SQLite reports `UNIQUE constraint failed: users.email`, PostgreSQL names the
/// index (`users_email_key`).
fn unique_violation_field(detail: &str) -> String {
    let detail = detail.to_lowercase();
    for field in ["email", "username"] {
        if detail.contains(field) {
            return field.to_string();
        }
    }
    FieldErrors::NON_FIELD.to_string()
}

/// Type alias for Result with StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
