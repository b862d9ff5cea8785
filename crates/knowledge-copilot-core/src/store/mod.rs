//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the system of record for ingested segments.
//! Backends: [`memory::InMemoryIndex`] here, plus the SQLite and
//! Chroma-compatible indexes in the app crate.
//!
//! Implementations must be `Send + Sync`. The core adds no locking of its
//! own around an index; each backend is responsible for being safe under
//! concurrent writers.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::{ensure_parallel, Embedder};
use crate::error::{CoreError, Result};
use crate::models::{ChunkMetadata, MetadataFilter, RetrievedDoc};

/// Persisted, similarity-searchable store of (segment, metadata, vector).
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Insert a batch, returning fresh ids |
/// | [`search`](VectorIndex::search) | Filtered nearest-neighbour query |
/// | [`list_all_metadata`](VectorIndex::list_all_metadata) | Enumerate every record |
///
/// There is no update or delete path.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert segments with their metadata.
    ///
    /// `metadatas` (and `embeddings`, when given) must be parallel to
    /// `texts`. Without embeddings the index computes them with its own
    /// embedder. Every segment gets a new UUID v4; ids are never reused.
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>>;

    /// Up to `k` entries closest to `query`, by ascending distance.
    ///
    /// When `filter` is given, only entries whose metadata matches every
    /// constraint are considered. Asking for more than the index holds
    /// returns everything available.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDoc>>;

    /// Metadata of every persisted entry.
    ///
    /// This is a full O(n) scan of the index, not a point lookup. Intended
    /// for summaries, not the query path.
    async fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>>;
}

/// Validate batch lengths for [`VectorIndex::add`].
pub fn check_batch(
    texts: &[String],
    metadatas: &[ChunkMetadata],
    embeddings: Option<&[Vec<f32>]>,
) -> Result<()> {
    if texts.len() != metadatas.len() {
        return Err(CoreError::operation(
            "add",
            format!(
                "{} segments but {} metadata records",
                texts.len(),
                metadatas.len()
            ),
        ));
    }
    if let Some(vecs) = embeddings {
        if vecs.len() != texts.len() {
            return Err(CoreError::operation(
                "add",
                format!("{} segments but {} embeddings", texts.len(), vecs.len()),
            ));
        }
    }
    Ok(())
}

/// Use the caller's embeddings, or compute them with `embedder`.
pub async fn resolve_embeddings(
    embedder: &dyn Embedder,
    texts: &[String],
    embeddings: Option<&[Vec<f32>]>,
) -> Result<Vec<Vec<f32>>> {
    match embeddings {
        Some(vecs) => Ok(vecs.to_vec()),
        None => {
            let vecs = embedder.embed(texts).await?;
            ensure_parallel(texts.len(), &vecs)?;
            Ok(vecs)
        }
    }
}

/// One fresh UUID v4 per segment.
pub fn new_ids(n: usize) -> Vec<String> {
    (0..n).map(|_| Uuid::new_v4().to_string()).collect()
}
