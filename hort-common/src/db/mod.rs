//! Database access layer shared by hort services

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

pub mod init;
pub mod models;

/// Connect to the service database, creating the file if it does not
/// exist yet. Foreign keys are enforced on every connection.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let pool = SqlitePool::connect(&db_url).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    Ok(pool)
}

/// Connect to an in-memory database (tests and local experiments).
pub async fn connect_in_memory() -> Result<SqlitePool> {
    // A single connection keeps the :memory: database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    Ok(pool)
}
