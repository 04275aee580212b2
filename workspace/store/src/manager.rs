use chrono::Utc;
use model::entities::{session, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, StoreError};
use crate::password::{Argon2Hasher, PasswordHasher, unusable_password};
use crate::validation::normalize_email;

/// Optional attributes accepted alongside the required account fields.
///
/// `None` means "not provided": the column default applies, or for
/// superusers the superuser default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Creates accounts and manages their credentials.
///
/// Every method takes the connection to run on, so callers can pass either a
/// pooled connection or an open transaction.
#[derive(Debug, Clone)]
pub struct AccountManager {
    hasher: Arc<dyn PasswordHasher>,
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new(Arc::new(Argon2Hasher::new()))
    }
}

impl AccountManager {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }

    /// Creates and saves an account identified by `email`.
    ///
    /// A `None` password leaves the account without a usable password.
    #[instrument(skip(self, db, password))]
    pub async fn create_account<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        username: &str,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> Result<user::Model> {
        trace!("Entering create_account");

        let email = normalize_email(email);
        if email.is_empty() {
            warn!("Rejected account creation without an email");
            return Err(StoreError::validation("email", "The Email field must be set"));
        }

        let mut account = user::ActiveModel {
            email: Set(email),
            username: Set(username.to_string()),
            first_name: Set(extra.first_name.unwrap_or_default()),
            last_name: Set(extra.last_name.unwrap_or_default()),
            is_active: Set(extra.is_active.unwrap_or(true)),
            is_staff: Set(extra.is_staff.unwrap_or(false)),
            is_superuser: Set(extra.is_superuser.unwrap_or(false)),
            last_login: Set(None),
            ..Default::default()
        };

        match password {
            Some(password) => self.set_password(&mut account, password)?,
            None => self.set_unusable_password(&mut account),
        }

        let created = account.insert(db).await?;
        info!(
            "Account created with ID: {}, username: {}",
            created.id, created.username
        );
        Ok(created)
    }

    /// Creates an account with staff and superuser rights.
    ///
    /// `is_staff`, `is_superuser` and `is_active` default to `true`; passing
    /// `false` for either of the first two is an error.
    #[instrument(skip(self, db, password))]
    pub async fn create_superuser<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        username: &str,
        password: Option<&str>,
        mut extra: ExtraFields,
    ) -> Result<user::Model> {
        let is_staff = *extra.is_staff.get_or_insert(true);
        let is_superuser = *extra.is_superuser.get_or_insert(true);
        extra.is_active.get_or_insert(true);

        if !is_staff {
            return Err(StoreError::validation("is_staff", "Superuser must have is_staff=True."));
        }
        if !is_superuser {
            return Err(StoreError::validation(
                "is_superuser",
                "Superuser must have is_superuser=True.",
            ));
        }

        self.create_account(db, email, username, password, extra).await
    }

    /// Replaces the stored hash with one derived from `plaintext`.
    /// The caller is responsible for saving `account`.
    pub fn set_password(&self, account: &mut user::ActiveModel, plaintext: &str) -> Result<()> {
        account.password_hash = Set(self.hasher.hash(plaintext)?);
        Ok(())
    }

    /// Marks the account as having no password that can ever match.
    pub fn set_unusable_password(&self, account: &mut user::ActiveModel) {
        account.password_hash = Set(unusable_password());
    }

    pub fn check_password(&self, account: &user::Model, plaintext: &str) -> bool {
        self.hasher.verify(plaintext, &account.password_hash)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i32,
    ) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(db).await?)
    }

    /// Looks an account up by email, normalizing the input first.
    pub async fn find_by_email<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
    ) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(db)
            .await?)
    }

    pub async fn email_taken<C: ConnectionTrait>(&self, db: &C, email: &str) -> Result<bool> {
        let count = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// Whether another account already uses `username`.
    /// `except_id` excludes the account being updated.
    pub async fn username_taken<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
        except_id: Option<i32>,
    ) -> Result<bool> {
        let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
        if let Some(id) = except_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        Ok(query.count(db).await? > 0)
    }

    /// Verifies email and password of an active account and stamps `last_login`.
    #[instrument(skip(self, db, password))]
    pub async fn authenticate<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        password: &str,
    ) -> Result<Option<user::Model>> {
        let Some(account) = self.find_by_email(db, email).await? else {
            // Unknown emails still pay the hashing cost.
            let _ = self.hasher.hash(password);
            debug!("No account for the given email");
            return Ok(None);
        };

        if !self.check_password(&account, password) {
            debug!("Password mismatch for account {}", account.id);
            return Ok(None);
        }
        if !account.is_active {
            debug!("Account {} is inactive", account.id);
            return Ok(None);
        }

        let mut active: user::ActiveModel = account.into();
        active.last_login = Set(Some(Utc::now()));
        let account = active.update(db).await?;
        info!("Account {} authenticated", account.id);
        Ok(Some(account))
    }

    /// Deletes the account and its sessions in one transaction.
    /// Returns `false` when no account has that id.
    #[instrument(skip(self, db))]
    pub async fn delete_account<C: TransactionTrait>(&self, db: &C, id: i32) -> Result<bool> {
        let txn = db.begin().await?;

        session::Entity::delete_many()
            .filter(session::Column::UserId.eq(id))
            .exec(&txn)
            .await?;
        let result = user::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        debug!("Delete affected {} account rows", result.rows_affected);
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup_db;
    use sea_orm::{DatabaseConnection, IntoActiveModel};

    async fn create_default(
        manager: &AccountManager,
        db: &DatabaseConnection,
        email: &str,
        username: &str,
    ) -> Result<user::Model> {
        manager
            .create_account(db, email, username, Some("testpass123"), ExtraFields::default())
            .await
    }

    #[tokio::test]
    async fn test_create_account() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "test@example.com", "testuser")
            .await
            .unwrap();

        assert_eq!(account.email, "test@example.com");
        assert_eq!(account.username, "testuser");
        assert!(manager.check_password(&account, "testpass123"));
        assert!(account.is_active);
        assert!(!account.is_staff);
        assert!(!account.is_superuser);
        assert_eq!(account.first_name, "");
        assert!(account.last_login.is_none());
    }

    #[tokio::test]
    async fn test_create_account_with_extra_fields() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let extra = ExtraFields {
            first_name: Some("John".to_string()),
            last_name: Some("Doe".to_string()),
            ..Default::default()
        };
        let account = manager
            .create_account(&db, "john@example.com", "jdoe", Some("testpass123"), extra)
            .await
            .unwrap();

        assert_eq!(account.full_name(), "John Doe");
        assert_eq!(account.short_name(), "jdoe");
    }

    #[tokio::test]
    async fn test_create_account_without_email() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        for email in ["", "   "] {
            let result = create_default(&manager, &db, email, "nomail").await;
            match result {
                Err(StoreError::Validation(errors)) => assert!(errors.contains("email")),
                other => panic!("Expected validation error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_email_normalization() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "A@B.COM", "ab").await.unwrap();
        assert_eq!(account.email, "a@b.com");

        let found = manager.find_by_email(&db, "a@B.com").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(account.id));
        assert!(manager.email_taken(&db, "A@b.COM").await.unwrap());
    }

    #[tokio::test]
    async fn test_username_unique() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        create_default(&manager, &db, "test1@example.com", "testuser")
            .await
            .unwrap();
        let result = create_default(&manager, &db, "test2@example.com", "testuser").await;

        match result {
            Err(StoreError::Integrity { field, .. }) => assert_eq!(field, "username"),
            other => panic!("Expected integrity error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_email_unique() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        create_default(&manager, &db, "same@example.com", "first")
            .await
            .unwrap();
        let result = create_default(&manager, &db, "SAME@example.com", "second").await;

        match result {
            Err(StoreError::Integrity { field, .. }) => assert_eq!(field, "email"),
            other => panic!("Expected integrity error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_username_taken_excludes_self() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "me@example.com", "me").await.unwrap();

        assert!(manager.username_taken(&db, "me", None).await.unwrap());
        assert!(!manager.username_taken(&db, "me", Some(account.id)).await.unwrap());
        assert!(!manager.username_taken(&db, "nobody", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_superuser() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = manager
            .create_superuser(
                &db,
                "admin@example.com",
                "admin",
                Some("adminpass123"),
                ExtraFields::default(),
            )
            .await
            .unwrap();

        assert!(manager.check_password(&account, "adminpass123"));
        assert!(account.is_active);
        assert!(account.is_staff);
        assert!(account.is_superuser);
    }

    #[tokio::test]
    async fn test_create_superuser_rejects_false_flags() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        for (extra, field) in [
            (
                ExtraFields {
                    is_staff: Some(false),
                    ..Default::default()
                },
                "is_staff",
            ),
            (
                ExtraFields {
                    is_superuser: Some(false),
                    ..Default::default()
                },
                "is_superuser",
            ),
        ] {
            let result = manager
                .create_superuser(&db, "admin@example.com", "admin", Some("adminpass123"), extra)
                .await;
            match result {
                Err(StoreError::Validation(errors)) => assert!(errors.contains(field)),
                other => panic!("Expected validation error, got {:?}", other),
            }
        }

        // Nothing was persisted
        assert!(manager.find_by_email(&db, "admin@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_password_and_unusable_password() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "pw@example.com", "pw").await.unwrap();

        let mut active = account.into_active_model();
        manager.set_password(&mut active, "brandnew456").unwrap();
        let account = active.update(&db).await.unwrap();
        assert!(manager.check_password(&account, "brandnew456"));
        assert!(!manager.check_password(&account, "testpass123"));

        let mut active = account.into_active_model();
        manager.set_unusable_password(&mut active);
        let account = active.update(&db).await.unwrap();
        assert!(!manager.check_password(&account, "brandnew456"));
        assert!(!manager.check_password(&account, ""));

        let passwordless = manager
            .create_account(&db, "nopw@example.com", "nopw", None, ExtraFields::default())
            .await
            .unwrap();
        assert!(!manager.check_password(&passwordless, ""));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "login@example.com", "login").await.unwrap();

        assert!(manager.authenticate(&db, "login@example.com", "wrong").await.unwrap().is_none());
        assert!(manager.authenticate(&db, "ghost@example.com", "testpass123").await.unwrap().is_none());

        let authenticated = manager
            .authenticate(&db, "LOGIN@example.com", "testpass123")
            .await
            .unwrap()
            .expect("credentials should match");
        assert_eq!(authenticated.id, account.id);
        assert!(authenticated.last_login.is_some());

        let mut active = authenticated.into_active_model();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();
        assert!(manager.authenticate(&db, "login@example.com", "testpass123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_account() {
        let db = setup_db().await;
        let manager = AccountManager::default();

        let account = create_default(&manager, &db, "bye@example.com", "bye").await.unwrap();

        assert!(manager.delete_account(&db, account.id).await.unwrap());
        assert!(manager.find_by_id(&db, account.id).await.unwrap().is_none());
        assert!(!manager.delete_account(&db, account.id).await.unwrap());
    }
}
