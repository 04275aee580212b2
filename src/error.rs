use crate::schemas::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use store::{FieldErrors, StoreError};
use thiserror::Error;
use tracing::{debug, error};

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input rejected; messages are keyed by field
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// No valid session accompanied the request
    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthenticated,

    /// The addressed record does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request body could not be read
    #[error("{0}")]
    BadRequest(String),

    /// Anything the caller cannot fix
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthenticated => "NOT_AUTHENTICATED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "INVALID_REQUEST_BODY",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (error, fields) = match self {
            ApiError::Validation(fields) => {
                debug!("Validation failed: {}", fields);
                ("Invalid input.".to_string(), Some(fields.into_inner()))
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = ErrorResponse {
            error,
            code,
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Validation(fields) => ApiError::Validation(fields),
            StoreError::Integrity { field, message } => ApiError::validation(field, message),
            StoreError::Database(db_error) => ApiError::Internal(db_error.to_string()),
            StoreError::Hashing(detail) | StoreError::Configuration(detail) => {
                ApiError::Internal(detail)
            }
        }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        StoreError::from(error).into()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(field_errors(&errors))
    }
}

/// Flattens `validator` output into field-scoped messages.
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, field_errors) in errors.field_errors() {
        for field_error in field_errors.iter() {
            let message = field_error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("Invalid value ({}).", field_error.code));
            fields.add(field.to_string(), message);
        }
    }
    fields
}
