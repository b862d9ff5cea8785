//! SQLite-backed [`VectorIndex`] for a local persisted directory.
//!
//! Each segment is one row in `entries`, with its embedding stored as a
//! little-endian `f32` BLOB. Similarity is computed in Rust by a brute-force
//! cosine scan over the rows that pass the metadata filter, which keeps the
//! schema free of extensions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use knowledge_copilot_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use knowledge_copilot_core::models::{ChunkMetadata, MetadataFilter, RetrievedDoc, FILTERABLE_KEYS};
use knowledge_copilot_core::store::{check_batch, new_ids, resolve_embeddings, VectorIndex};
use knowledge_copilot_core::{CoreError, Result};

use crate::{db, migrate};

pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteIndex {
    /// Open or create the index under `index_dir`.
    ///
    /// Fails with [`CoreError::IndexUnavailable`] if the directory or the
    /// database cannot be opened.
    pub async fn open(index_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(index_dir).await.map_err(|e| {
            CoreError::unavailable(format!("cannot open index at {}", index_dir.display()), e)
        })?;
        migrate::run_migrations(&pool).await.map_err(|e| {
            CoreError::unavailable(
                format!("cannot prepare index schema at {}", index_dir.display()),
                e,
            )
        })?;

        info!(path = %index_dir.display(), "opened local index");
        Ok(Self { pool, embedder })
    }

    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::operation("count", e))?;
        Ok(n as usize)
    }
}

/// Column for a filter key. Filterable keys are also the column names, and
/// only those are ever interpolated into SQL.
fn filter_column(key: &str) -> Option<&'static str> {
    FILTERABLE_KEYS.iter().copied().find(|k| *k == key)
}

fn where_clause(filter: Option<&MetadataFilter>) -> Result<(String, Vec<String>)> {
    let Some(filter) = filter.filter(|f| !f.is_empty()) else {
        return Ok((String::new(), Vec::new()));
    };
    filter.validate()?;

    let mut conditions = Vec::new();
    let mut values = Vec::new();
    for (key, value) in filter.iter() {
        let column = filter_column(key).ok_or_else(|| {
            CoreError::operation("search", format!("unsupported filter key '{}'", key))
        })?;
        conditions.push(format!("{} = ?", column));
        values.push(value.to_string());
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), values))
}

fn row_metadata(row: &SqliteRow) -> std::result::Result<ChunkMetadata, String> {
    let source_type: String = row.get("source_type");
    let created_at: String = row.get("created_at");
    Ok(ChunkMetadata {
        source_type: source_type.parse().map_err(|e: CoreError| e.to_string())?,
        file_name: row.get("file_name"),
        url: row.get("url"),
        content_type: row.get("content_type"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| format!("bad created_at '{}': {}", created_at, e))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>> {
        check_batch(texts, metadatas, embeddings)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = resolve_embeddings(self.embedder.as_ref(), texts, embeddings).await?;
        let ids = new_ids(texts.len());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::operation("add", e))?;

        for ((id, text), (meta, vector)) in ids
            .iter()
            .zip(texts)
            .zip(metadatas.iter().zip(vectors.iter()))
        {
            sqlx::query(
                r#"
                INSERT INTO entries (id, text, source_type, file_name, url,
                                     content_type, created_at, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(text)
            .bind(meta.source_type.as_str())
            .bind(&meta.file_name)
            .bind(&meta.url)
            .bind(&meta.content_type)
            .bind(meta.created_at.to_rfc3339())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::operation("add", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| CoreError::operation("add", e))?;

        debug!(count = ids.len(), "inserted entries");
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDoc>> {
        let (clause, values) = where_clause(filter)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;

        let sql = format!(
            "SELECT text, source_type, file_name, url, content_type, created_at, embedding \
             FROM entries{} ORDER BY seq",
            clause
        );
        let mut q = sqlx::query(&sql);
        for value in &values {
            q = q.bind(value);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::operation("search", e))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata = row_metadata(row).map_err(|e| CoreError::operation("search", e))?;
            hits.push(RetrievedDoc {
                text: row.get("text"),
                metadata,
                score: cosine_distance(&query_vec, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>> {
        let rows = sqlx::query(
            "SELECT source_type, file_name, url, content_type, created_at FROM entries ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::operation("list", e))?;

        rows.iter()
            .map(|row| row_metadata(row).map_err(|e| CoreError::operation("list", e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_whitelists_keys() {
        let (clause, values) = where_clause(None).unwrap();
        assert!(clause.is_empty() && values.is_empty());

        let filter = MetadataFilter::source_type("url").with("content_type", "html");
        let (clause, values) = where_clause(Some(&filter)).unwrap();
        assert_eq!(clause, " WHERE content_type = ? AND source_type = ?");
        assert_eq!(values, vec!["html", "url"]);

        let bad = MetadataFilter::new().with("text; DROP TABLE entries", "x");
        let err = where_clause(Some(&bad)).unwrap_err();
        assert!(matches!(err, CoreError::IndexOperation { operation: "search", .. }));
    }
}
