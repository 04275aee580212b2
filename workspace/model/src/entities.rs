//! This file serves as the root for all SeaORM entity modules.
//! The account subsystem persists two tables: `users` and the
//! `sessions` issued to them on login.

pub mod session;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::session::Entity as Session;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn new_user(email: &str, username: &str) -> user::ActiveModel {
        user::ActiveModel {
            email: Set(email.to_string()),
            username: Set(username.to_string()),
            password_hash: Set("!unusable".to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let before = Utc::now();
        let player = new_user("player@example.com", "player1").insert(&db).await?;
        assert!(player.id > 0);
        assert!(player.date_joined >= before - Duration::seconds(1));
        assert!(player.last_login.is_none());

        let session = session::ActiveModel {
            key: Set("0123456789abcdef0123456789abcdef".to_string()),
            user_id: Set(player.id),
            created_at: Set(Utc::now()),
            expires_at: Set(Utc::now() + Duration::hours(1)),
        }
        .insert(&db)
        .await?;

        let sessions = player.find_related(Session).all(&db).await?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].key, session.key);

        let owner = session.find_related(User).one(&db).await?;
        assert_eq!(owner.map(|u| u.id), Some(player.id));

        // Deleting the user cascades to its sessions
        player.delete(&db).await?;
        let remaining = Session::find()
            .filter(session::Column::UserId.eq(session.user_id))
            .all(&db)
            .await?;
        assert!(remaining.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_username_and_email_are_unique() -> Result<(), DbErr> {
        let db = setup_db().await?;

        new_user("one@example.com", "gamer").insert(&db).await?;

        let same_username = new_user("two@example.com", "gamer").insert(&db).await;
        assert!(same_username.is_err());

        let same_email = new_user("one@example.com", "other").insert(&db).await;
        assert!(same_email.is_err());

        Ok(())
    }

    #[test]
    fn test_display_and_names() {
        let mut player = user::Model {
            id: 1,
            email: "test@example.com".to_string(),
            username: "gamertag123".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
            last_login: None,
        };

        assert_eq!(player.to_string(), "gamertag123 (test@example.com)");
        assert_eq!(player.short_name(), "gamertag123");
        assert_eq!(player.full_name(), "test@example.com");

        player.first_name = "John".to_string();
        player.last_name = "Doe".to_string();
        assert_eq!(player.full_name(), "John Doe");

        player.last_name = String::new();
        assert_eq!(player.full_name(), "John");
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = session::Model {
            key: "k".to_string(),
            user_id: 1,
            created_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - Duration::hours(3)));
    }
}
