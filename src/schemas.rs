use crate::config::Settings;
use crate::handlers::auth::{LoginRequest, LoginResponse};
use crate::handlers::users::{
    ChangePasswordRequest, CreateUserRequest, ReplaceUserRequest, UpdateUserRequest,
    UserListQuery, UserResponse,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use store::{AccountManager, SessionStore};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Account creation and credential checks
    pub accounts: AccountManager,
    /// Login sessions
    pub sessions: SessionStore,
    /// Runtime settings
    pub settings: Settings,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Field-scoped validation messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct SessionAuth;

impl Modify for SessionAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::replace_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::me,
        crate::handlers::users::update_profile,
        crate::handlers::users::change_password,
    ),
    components(
        schemas(
            ErrorResponse,
            DetailResponse,
            HealthResponse,
            UserResponse,
            UserListQuery,
            CreateUserRequest,
            UpdateUserRequest,
            ReplaceUserRequest,
            ChangePasswordRequest,
            LoginRequest,
            LoginResponse,
        )
    ),
    modifiers(&SessionAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Session login and logout"),
        (name = "users", description = "Account registration and profile management"),
    ),
    info(
        title = "PopcornGuess Accounts API",
        description = "Player accounts: registration, profiles and passwords",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
