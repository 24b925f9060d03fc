//! PostgreSQL persistence for achievements: models, repositories, the
//! storage adapter implementing the core ports, and the built-in
//! award-history criteria providers.

use accolade_core::error::CoreError;
use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod providers;
pub mod repositories;
pub mod store;

pub use providers::builtin_catalog;
pub use store::PgAchievementStore;

pub type DbPool = sqlx::PgPool;

/// Default pool size when `DATABASE_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    /// Load connection settings from environment variables.
    ///
    /// | Env Var                    | Default    |
    /// |----------------------------|------------|
    /// | `DATABASE_URL`             | (required) |
    /// | `DATABASE_MAX_CONNECTIONS` | `10`       |
    pub fn from_env() -> Result<Self, CoreError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| CoreError::Validation("DATABASE_URL must be set".into()))?;
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(CoreError::Validation(format!(
                        "DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                    )))
                }
            },
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
