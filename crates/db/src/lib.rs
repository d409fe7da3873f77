//! Postgres access for agentdesk: pool setup, migrations, models,
//! repositories, and the claim change listener.

use sqlx::postgres::PgPoolOptions;

pub mod listener;
pub mod models;
pub mod repositories;

pub use listener::ClaimListener;

pub type DbPool = sqlx::PgPool;

/// PostgreSQL SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Returns `true` if `err` is a unique-constraint violation.
///
/// When `constraint` is given, the violated constraint must also match.
pub fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && constraint.map_or(true, |name| db_err.constraint() == Some(name))
        }
        _ => false,
    }
}
