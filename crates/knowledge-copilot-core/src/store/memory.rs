//! In-memory [`VectorIndex`] for tests and embedded use.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Search is a
//! brute-force cosine distance scan over every entry that passes the
//! metadata filter.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder};
use crate::error::Result;
use crate::models::{ChunkMetadata, IndexEntry, MetadataFilter, RetrievedDoc};

use super::{check_batch, new_ids, resolve_embeddings, VectorIndex};

/// Non-persistent index; contents are lost when it is dropped.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    /// The embedder is used for queries and for `add` calls made without
    /// precomputed embeddings.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>> {
        check_batch(texts, metadatas, embeddings)?;
        let vectors = resolve_embeddings(self.embedder.as_ref(), texts, embeddings).await?;
        let ids = new_ids(texts.len());

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for (((id, text), meta), vector) in ids
            .iter()
            .zip(texts)
            .zip(metadatas)
            .zip(vectors.into_iter())
        {
            entries.push(IndexEntry {
                id: id.clone(),
                text: text.clone(),
                metadata: meta.clone(),
                embedding: vector,
            });
        }
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDoc>> {
        if let Some(filter) = filter {
            filter.validate()?;
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<RetrievedDoc> = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.metadata)))
            .map(|e| RetrievedDoc {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                score: cosine_distance(&query_vec, &e.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.iter().map(|e| e.metadata.clone()).collect())
    }
}
