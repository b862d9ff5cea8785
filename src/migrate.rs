//! Schema for the local index. Idempotent; runs on every open.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // `seq` preserves insertion order for listing; `id` is the public key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            text TEXT NOT NULL,
            source_type TEXT NOT NULL,
            file_name TEXT,
            url TEXT,
            content_type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source_type ON entries(source_type)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect(tmp.path()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(db::database_path(tmp.path()).exists());
    }
}
