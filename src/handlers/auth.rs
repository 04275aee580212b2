use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentSession};
use crate::handlers::users::UserResponse;
use crate::schemas::{AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::FieldErrors;
use tracing::{info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Credentials for opening a session
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(required(message = "This field is required."))]
    pub email: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub password: Option<String>,
}

/// A freshly opened session
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Session key; send as `Authorization: Bearer <token>`
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    trace!("Entering login function");
    request.validate()?;

    let email = request.email.as_deref().unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();
    let Some(account) = state
        .accounts
        .authenticate(&state.db, email, password)
        .await?
    else {
        warn!("Login failed");
        return Err(ApiError::Validation(FieldErrors::single(
            FieldErrors::NON_FIELD,
            "Unable to log in with provided credentials.",
        )));
    };

    let session = state.sessions.create(&state.db, &account).await?;
    info!("Account {} logged in", account.id);

    Ok(Json(LoginResponse {
        token: session.key,
        expires_at: session.expires_at,
        user: UserResponse::from(account),
    }))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(("session" = [])),
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, current))]
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<StatusCode, ApiError> {
    state.sessions.revoke(&state.db, &current.session.key).await?;
    info!("Account {} logged out", current.account.id);
    Ok(StatusCode::NO_CONTENT)
}
