use super::initdb::connect;
use anyhow::Result;
use sea_orm::DatabaseConnection;
use store::SessionStore;
use tracing::{info, trace};

/// Deletes every expired login session.
pub async fn clear_sessions(database_url: &str) -> Result<u64> {
    trace!("Entering clear_sessions function");
    let db = connect(database_url).await?;
    clear_sessions_with(&db).await
}

pub async fn clear_sessions_with(db: &DatabaseConnection) -> Result<u64> {
    let removed = SessionStore::default().purge_expired(db).await?;
    info!("Removed {} expired sessions", removed);
    Ok(removed)
}
