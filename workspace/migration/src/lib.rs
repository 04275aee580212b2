pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_create_sessions_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_sessions_table::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_migrations_apply_and_revert() {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None).await.expect("Failed to apply migrations");

        let manager = SchemaManager::new(&db);
        assert!(manager.has_table("users").await.unwrap());
        assert!(manager.has_table("sessions").await.unwrap());
        assert!(manager.has_column("users", "password_hash").await.unwrap());

        Migrator::down(&db, None).await.expect("Failed to revert migrations");
        assert!(!manager.has_table("users").await.unwrap());
        assert!(!manager.has_table("sessions").await.unwrap());
    }
}
