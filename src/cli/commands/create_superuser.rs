use anyhow::{bail, Result};
use clap::Args;
use model::entities::user;
use sea_orm::ConnectionTrait;
use store::validation::{is_valid_username, PASSWORD_MIN_LENGTH, USERNAME_HELP};
use store::{AccountManager, ExtraFields};
use tracing::{info, trace};

use super::initdb::{apply_migrations, connect};

#[derive(Args, Debug)]
pub struct SuperuserArgs {
    /// Database URL
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite://popcornguess.db?mode=rwc")]
    pub database_url: String,

    /// Login email of the new superuser
    #[arg(long)]
    pub email: String,

    /// Display name of the new superuser
    #[arg(long)]
    pub username: String,

    /// Password; prefer the environment variable over the command line
    #[arg(long, env = "POPCORN_SUPERUSER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create the account without a usable password
    #[arg(long, conflicts_with = "password")]
    pub no_password: bool,

    /// Apply pending migrations first
    #[arg(long)]
    pub migrate: bool,
}

pub async fn create_superuser(args: SuperuserArgs) -> Result<()> {
    trace!("Entering create_superuser function");

    let db = connect(&args.database_url).await?;
    if args.migrate {
        apply_migrations(&db).await?;
    }

    let account = create_superuser_with(&db, &AccountManager::default(), &args).await?;
    info!("Superuser created successfully: {}", account);
    println!("Superuser created successfully: {}", account);
    Ok(())
}

/// Checks the arguments and creates the account on `db`.
pub async fn create_superuser_with<C: ConnectionTrait>(
    db: &C,
    accounts: &AccountManager,
    args: &SuperuserArgs,
) -> Result<user::Model> {
    if !is_valid_username(&args.username) {
        bail!("{}", USERNAME_HELP);
    }

    let password = match (&args.password, args.no_password) {
        (Some(password), _) if password.chars().count() < PASSWORD_MIN_LENGTH => {
            bail!("Password must have at least {} characters", PASSWORD_MIN_LENGTH)
        }
        (Some(password), _) => Some(password.as_str()),
        (None, true) => None,
        (None, false) => bail!("Provide --password (or POPCORN_SUPERUSER_PASSWORD) or --no-password"),
    };

    let account = accounts
        .create_superuser(db, &args.email, &args.username, password, ExtraFields::default())
        .await?;
    Ok(account)
}
