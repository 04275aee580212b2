use anyhow::{ensure, Result};
use config::{Config, Environment};
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use store::{AccountManager, SessionStore};
use tracing::{debug, info};

use crate::schemas::AppState;

/// Upper bound for `session_ttl_hours` (ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366 * 10;

/// Runtime settings not covered by CLI arguments.
///
/// Read from `POPCORN_*` environment variables (and `.env`), e.g.
/// `POPCORN_SESSION_TTL_HOURS=24`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Lifetime of a login session
    pub session_ttl_hours: i64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 14,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from the environment on top of the defaults.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::with_prefix("POPCORN"))
    }

    fn from_environment(environment: Environment) -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("session_ttl_hours", defaults.session_ttl_hours)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours),
            "session_ttl_hours must be between 1 and {}, got {}",
            MAX_SESSION_TTL_HOURS,
            self.session_ttl_hours
        );
        ensure!(self.request_timeout_secs > 0, "request_timeout_secs must be positive");
        Ok(())
    }

    /// Session lifetime; unrepresentable values saturate and are refused
    /// when a session is opened.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.session_ttl_hours).unwrap_or(chrono::Duration::MAX)
    }
}

/// Assemble the application state around an open connection
pub fn build_app_state(db: DatabaseConnection, settings: Settings) -> AppState {
    AppState {
        db,
        accounts: AccountManager::default(),
        sessions: SessionStore::new(settings.session_ttl()),
        settings,
    }
}

/// Initialize application configuration and state
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    let settings = Settings::load()?;
    debug!("Loaded settings: {:?}", settings);

    // Connect to database
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    Ok(build_app_state(db, settings))
}
