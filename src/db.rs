//! SQLite connection management for the local index.
//!
//! The index directory is created on demand and holds a single database
//! file, `index.sqlite`. Connections use WAL mode so that background
//! ingestion can write while chat requests read.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DATABASE_FILE: &str = "index.sqlite";

/// Path of the database file inside an index directory.
pub fn database_path(index_dir: &Path) -> PathBuf {
    index_dir.join(DATABASE_FILE)
}

/// Open (creating if needed) the database under `index_dir`.
pub async fn connect(index_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(index_dir)
        .with_context(|| format!("Failed to create index directory: {}", index_dir.display()))?;

    let db_path = database_path(index_dir);
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    Ok(pool)
}
