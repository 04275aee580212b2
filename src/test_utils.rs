use crate::config::{build_app_state, Settings};
use crate::router::create_router;
use crate::schemas::AppState;
use axum::http::HeaderValue;
use axum::Router;
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Password used for every account created by these helpers.
pub const TEST_PASSWORD: &str = "testpass123";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");

    // Run migrations
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    build_app_state(setup_test_db().await, Settings::default())
}

/// Install the test log subscriber once per test binary.
///
/// The log level is determined by the RUST_LOG environment variable,
/// defaulting to WARN if not set. Output goes through the test writer so it
/// is captured per test.
pub fn init_test_tracing() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    // Later calls find the subscriber already installed.
    let _ = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_test_writer()
        .try_init();
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    init_test_tracing();
    create_router(setup_test_app_state().await)
}

/// Test server together with the state it runs on, for asserting on the store
pub async fn setup_test_server() -> (TestServer, AppState) {
    init_test_tracing();
    let state = setup_test_app_state().await;
    let server = TestServer::new(create_router(state.clone())).unwrap();
    (server, state)
}

/// Registration payload for `username` with a matching password pair
pub fn registration(email: &str, username: &str) -> Value {
    json!({
        "email": email,
        "username": username,
        "password": TEST_PASSWORD,
        "password_confirm": TEST_PASSWORD,
    })
}

/// Register an account over HTTP and return its record
pub async fn register(server: &TestServer, email: &str, username: &str) -> Value {
    let response = server
        .post("/api/v1/users")
        .json(&registration(email, username))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

/// Log in over HTTP and return the session token
pub async fn login(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"].as_str().expect("token in login response").to_string()
}

/// Register and log in, returning the record and the session token
pub async fn register_and_login(server: &TestServer, email: &str, username: &str) -> (Value, String) {
    let record = register(server, email, username).await;
    let token = login(server, email, TEST_PASSWORD).await;
    (record, token)
}

/// `Authorization` header value carrying a session token
pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}
