use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Opens the single-file tracker database, creating it (and its parent
/// directory) if missing.
///
/// The pool is capped at one connection: the tracker assumes a single writer
/// per process.
pub async fn create_pool(path: &Path) -> Result<SqlitePool> {
    info!("Opening tracker database at {}...", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = single_connection()
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open tracker database {}", path.display()))?;

    info!("Tracker database connection established");
    Ok(pool)
}

/// In-memory database on a single connection that never recycles, so the
/// data lives as long as the pool.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    Ok(single_connection().connect_with(options).await?)
}

fn single_connection() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}
