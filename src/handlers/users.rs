use crate::error::{ApiError, field_errors};
use crate::extract::{ApiJson, CurrentSession};
use crate::schemas::{AppState, DetailResponse, ErrorResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use store::validation::{USERNAME_HELP, is_valid_username};
use store::{ExtraFields, FieldErrors};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

const PASSWORD_MISMATCH: &str = "Password fields didn't match.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "user with this email address already exists.";

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username").with_message(Cow::Borrowed(USERNAME_HELP)))
    }
}

/// Request body for registering a new user
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    /// Login email (must be unique, stored lower-cased)
    #[validate(required(message = "This field is required."), email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    /// Display name / gamertag (must be unique)
    #[validate(required(message = "This field is required."), custom(function = "validate_username"))]
    pub username: Option<String>,
    /// Plaintext password, at least 8 characters
    #[validate(
        required(message = "This field is required."),
        length(min = 8, message = "Ensure this field has at least 8 characters.")
    )]
    pub password: Option<String>,
    /// Must repeat `password`
    #[validate(required(message = "This field is required."))]
    pub password_confirm: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

/// Request body for a partial profile update
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    /// Username (must be unique)
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

/// Request body for a full profile update
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct ReplaceUserRequest {
    /// Username (must be unique)
    #[validate(required(message = "This field is required."))]
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<ReplaceUserRequest> for UpdateUserRequest {
    fn from(request: ReplaceUserRequest) -> Self {
        Self {
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
        }
    }
}

/// Request body for changing the caller's password
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(required(message = "This field is required."))]
    pub old_password: Option<String>,
    #[validate(
        required(message = "This field is required."),
        length(min = 8, message = "Ensure this field has at least 8 characters.")
    )]
    pub new_password: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub new_password_confirm: Option<String>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct UserListQuery {
    /// Page number, starting at 1
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<u64>,
    /// Page size; all users are returned when omitted
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// User response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            is_active: model.is_active,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

/// Value of a field already checked by a `required` validator.
fn present(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

async fn find_user(state: &AppState, user_id: i32) -> Result<user::Model, ApiError> {
    match state.accounts.find_by_id(&state.db, user_id).await? {
        Some(account) => Ok(account),
        None => {
            warn!("User with ID {} not found", user_id);
            Err(ApiError::NotFound(format!("User {} not found", user_id)))
        }
    }
}

/// Validates and applies a profile change, saving only when something changed.
async fn apply_profile_update(
    state: &AppState,
    account: user::Model,
    request: UpdateUserRequest,
) -> Result<user::Model, ApiError> {
    request.validate()?;

    if let Some(username) = &request.username {
        if *username != account.username
            && state
                .accounts
                .username_taken(&state.db, username, Some(account.id))
                .await?
        {
            return Err(ApiError::validation("username", USERNAME_TAKEN));
        }
    }

    let user_id = account.id;
    let mut active = account.clone().into_active_model();
    let mut updated_fields = Vec::new();

    if let Some(username) = request.username.filter(|u| *u != account.username) {
        updated_fields.push(format!("username: {}", username));
        active.username = Set(username);
    }
    if let Some(first_name) = request.first_name.filter(|n| *n != account.first_name) {
        updated_fields.push(format!("first_name: {}", first_name));
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = request.last_name.filter(|n| *n != account.last_name) {
        updated_fields.push(format!("last_name: {}", last_name));
        active.last_name = Set(last_name);
    }

    if updated_fields.is_empty() {
        debug!("No fields to update for user ID: {}", user_id);
        return Ok(account);
    }

    debug!("Updating fields: {}", updated_fields.join(", "));
    let updated = active.update(&state.db).await?;
    info!(
        "User with ID {} updated successfully. Updated fields: {}",
        user_id,
        updated_fields.join(", ")
    );
    Ok(updated)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(mut request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    trace!("Entering create_user function");
    request.email = trimmed(request.email);
    debug!("Registering user with username: {:?}", request.username);

    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(validation) => field_errors(&validation),
    };
    if let (Some(password), Some(confirm)) = (&request.password, &request.password_confirm) {
        if password != confirm {
            errors.add("password", PASSWORD_MISMATCH);
        }
    }
    if !errors.contains("email")
        && state
            .accounts
            .email_taken(&state.db, present(&request.email))
            .await?
    {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.contains("username")
        && state
            .accounts
            .username_taken(&state.db, present(&request.username), None)
            .await?
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        warn!("Registration rejected: {}", errors);
        return Err(ApiError::Validation(errors));
    }

    let account = state
        .accounts
        .create_account(
            &state.db,
            present(&request.email),
            present(&request.username),
            Some(present(&request.password)),
            ExtraFields {
                first_name: request.first_name,
                last_name: request.last_name,
                ..Default::default()
            },
        )
        .await?;

    info!(
        "User registered successfully with ID: {}, username: {}",
        account.id, account.username
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(account))))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserListQuery),
    security(("session" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = Vec<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _current))]
pub async fn get_users(
    State(state): State<AppState>,
    _current: CurrentSession,
    Valid(Query(query)): Valid<Query<UserListQuery>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    trace!("Entering get_users function");

    let finder = user::Entity::find()
        .order_by_desc(user::Column::DateJoined)
        .order_by_desc(user::Column::Id);

    let users = match query.limit {
        Some(limit) => {
            let page = query.page.unwrap_or(1);
            debug!("Fetching users - page: {}, limit: {}", page, limit);
            finder.paginate(&state.db, limit).fetch_page(page - 1).await?
        }
        None => {
            debug!("Fetching all users from database");
            finder.all(&state.db).await?
        }
    };

    info!("Successfully retrieved {} users", users.len());
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    security(("session" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _current))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    _current: CurrentSession,
) -> Result<Json<UserResponse>, ApiError> {
    trace!("Entering get_user function for user_id: {}", user_id);
    let account = find_user(&state, user_id).await?;
    Ok(Json(UserResponse::from(account)))
}

/// Replace a user's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = ReplaceUserRequest,
    security(("session" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _current, request))]
pub async fn replace_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    _current: CurrentSession,
    ApiJson(request): ApiJson<ReplaceUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    trace!("Entering replace_user function for user_id: {}", user_id);
    request.validate()?;
    let account = find_user(&state, user_id).await?;
    let updated = apply_profile_update(&state, account, request.into()).await?;
    Ok(Json(UserResponse::from(updated)))
}

/// Partially update a user's profile
#[utoipa::path(
    patch,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    security(("session" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _current, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    _current: CurrentSession,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    trace!("Entering update_user function for user_id: {}", user_id);
    let account = find_user(&state, user_id).await?;
    let updated = apply_profile_update(&state, account, request).await?;
    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    security(("session" = [])),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, current))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<StatusCode, ApiError> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    debug!("Account {} deleting user {}", current.account.id, user_id);

    if state.accounts.delete_account(&state.db, user_id).await? {
        info!("User with ID {} deleted successfully", user_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!("User with ID {} not found for deletion", user_id);
        Err(ApiError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("session" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(current))]
pub async fn me(current: CurrentSession) -> Json<UserResponse> {
    trace!("Returning profile of account {}", current.account.id);
    Json(UserResponse::from(current.account))
}

/// Update the authenticated user's profile
#[utoipa::path(
    patch,
    path = "/api/v1/users/update_profile",
    tag = "users",
    request_body = UpdateUserRequest,
    security(("session" = [])),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, current, request))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentSession,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    trace!("Entering update_profile for account {}", current.account.id);
    let updated = apply_profile_update(&state, current.account, request).await?;
    Ok(Json(UserResponse::from(updated)))
}

/// Change the authenticated user's password
///
/// Other sessions of the account are ended; the calling session stays valid.
#[utoipa::path(
    post,
    path = "/api/v1/users/change_password",
    tag = "users",
    request_body = ChangePasswordRequest,
    security(("session" = [])),
    responses(
        (status = 200, description = "Password changed successfully", body = DetailResponse),
        (status = 400, description = "Validation error or incorrect old password", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, current, request))]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentSession,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<DetailResponse>, ApiError> {
    let CurrentSession { account, session } = current;
    trace!("Entering change_password for account {}", account.id);

    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(validation) => field_errors(&validation),
    };
    if let (Some(new_password), Some(confirm)) =
        (&request.new_password, &request.new_password_confirm)
    {
        if new_password != confirm {
            errors.add("new_password", PASSWORD_MISMATCH);
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if !state
        .accounts
        .check_password(&account, present(&request.old_password))
    {
        warn!("Incorrect old password for account {}", account.id);
        return Err(ApiError::validation("old_password", "Old password is incorrect."));
    }

    let account_id = account.id;
    let mut active = account.into_active_model();
    state
        .accounts
        .set_password(&mut active, present(&request.new_password))?;
    active.update(&state.db).await?;

    let revoked = state
        .sessions
        .revoke_others(&state.db, account_id, &session.key)
        .await?;
    info!(
        "Password changed for account {} ({} other sessions ended)",
        account_id, revoked
    );

    Ok(Json(DetailResponse {
        detail: "Password changed successfully.".to_string(),
    }))
}
