use chrono::{Duration, Utc};
use model::entities::{session, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use tracing::{debug, info, instrument, trace};

use crate::error::{Result, StoreError};

/// Issues and resolves login sessions.
///
/// A session key is an opaque random token; the client presents it on every
/// authenticated request.
#[derive(Debug, Clone)]
pub struct SessionStore {
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::weeks(2))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a new session for `account`.
    #[instrument(skip(self, db, account), fields(account_id = account.id))]
    pub async fn create<C: ConnectionTrait>(
        &self,
        db: &C,
        account: &user::Model,
    ) -> Result<session::Model> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            StoreError::Configuration(format!("session lifetime {} is out of range", self.ttl))
        })?;
        let session = session::ActiveModel {
            key: Set(uuid::Uuid::new_v4().simple().to_string()),
            user_id: Set(account.id),
            created_at: Set(now),
            expires_at: Set(expires_at),
        }
        .insert(db)
        .await?;

        info!("Session opened for account {}", account.id);
        Ok(session)
    }

    /// Returns the session and its account when `key` names a live session of
    /// an active account. Expired sessions are removed on sight.
    #[instrument(skip_all)]
    pub async fn resolve<C: ConnectionTrait>(
        &self,
        db: &C,
        key: &str,
    ) -> Result<Option<(session::Model, user::Model)>> {
        trace!("Resolving session");

        let Some((session, account)) = session::Entity::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(db)
            .await?
        else {
            debug!("Unknown session key");
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            debug!("Session for account {} expired", session.user_id);
            session.delete(db).await?;
            return Ok(None);
        }

        match account {
            Some(account) if account.is_active => Ok(Some((session, account))),
            _ => {
                debug!("Session owner {} missing or inactive", session.user_id);
                Ok(None)
            }
        }
    }

    /// Ends a single session. Returns `false` if it did not exist.
    #[instrument(skip_all)]
    pub async fn revoke<C: ConnectionTrait>(&self, db: &C, key: &str) -> Result<bool> {
        let result = session::Entity::delete_by_id(key.to_string()).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Ends every session of `account_id` except `keep_key`.
    #[instrument(skip(self, db, keep_key))]
    pub async fn revoke_others<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        keep_key: &str,
    ) -> Result<u64> {
        let result = session::Entity::delete_many()
            .filter(session::Column::UserId.eq(account_id))
            .filter(session::Column::Key.ne(keep_key))
            .exec(db)
            .await?;

        debug!("Revoked {} other sessions", result.rows_affected);
        Ok(result.rows_affected)
    }

    /// Removes every expired session.
    pub async fn purge_expired<C: ConnectionTrait>(&self, db: &C) -> Result<u64> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(Utc::now()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
