use async_trait::async_trait;
use sea_orm::Set;
use sea_orm::entity::prelude::*;
use std::fmt;
use tracing::trace;

/// Represents a registered player account.
/// Email is the login identifier, username is the public gamertag.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Lower-cased at write time by the account manager.
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub username: String,
    /// Argon2 PHC string, or `!`-prefixed when the password is unusable.
    pub password_hash: String,
    #[sea_orm(default_value = "")]
    pub first_name: String,
    #[sea_orm(default_value = "")]
    pub last_name: String,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    #[sea_orm(default_value = "false")]
    pub is_staff: bool,
    #[sea_orm(default_value = "false")]
    pub is_superuser: bool,
    pub date_joined: DateTimeUtc,
    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Login sessions issued to this user.
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Model {
    /// First and last name separated by a space, or the email when both are blank.
    pub fn full_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.email.clone()
        } else {
            full_name.to_string()
        }
    }

    /// The gamertag.
    pub fn short_name(&self) -> &str {
        &self.username
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.email)
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.date_joined.is_not_set() {
            trace!("Stamping date_joined on new user");
            self.date_joined = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}
