//! Ingestion orchestration: chunk → embed → index.
//!
//! [`Ingestor::ingest`] turns a batch of raw documents into persisted index
//! entries with exactly one embedding call and one index write per batch,
//! no matter how many documents the batch holds.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chunk::{split_with, ChunkParams};
use crate::embedding::{ensure_parallel, Embedder};
use crate::error::Result;
use crate::models::{ChunkMetadata, SourceDocument};
use crate::store::VectorIndex;

/// Drives the chunker, embedding gateway, and vector index for one batch.
///
/// Collaborators are injected; the ingestor never builds its own.
#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    params: ChunkParams,
}

impl Ingestor {
    /// Fails with `InvalidConfiguration` if `params` cannot be walked.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        params: ChunkParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            embedder,
            index,
            params,
        })
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Persist every segment of `documents`, returning how many were written.
    ///
    /// Documents that chunk to nothing (empty or whitespace-only) are
    /// skipped silently. If the whole batch is empty, neither the embedder
    /// nor the index is called and `0` is returned.
    ///
    /// Any embedding or index failure aborts the whole batch; nothing is
    /// reported as partially written.
    pub async fn ingest(&self, documents: &[SourceDocument]) -> Result<usize> {
        let mut segments: Vec<String> = Vec::new();
        let mut metadatas: Vec<ChunkMetadata> = Vec::new();

        for doc in documents {
            let doc_segments = split_with(&doc.text, &self.params);
            if doc_segments.is_empty() {
                debug!(source = doc.metadata.source_name(), "skipping empty document");
                continue;
            }
            metadatas.extend(std::iter::repeat(doc.metadata.clone()).take(doc_segments.len()));
            segments.extend(doc_segments);
        }

        if segments.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed(&segments).await?;
        ensure_parallel(segments.len(), &embeddings)?;
        let ids = self
            .index
            .add(&segments, &metadatas, Some(&embeddings))
            .await?;

        info!(
            documents = documents.len(),
            segments = ids.len(),
            model = self.embedder.model_name(),
            "ingested batch"
        );
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::models::MetadataFilter;
    use crate::store::memory::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(CoreError::embedding("provider unreachable"));
            }
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    fn setup(embedder: Arc<CountingEmbedder>) -> (Ingestor, Arc<InMemoryIndex>) {
        let index = Arc::new(InMemoryIndex::new(embedder.clone()));
        let ingestor = Ingestor::new(embedder, index.clone(), ChunkParams::default()).unwrap();
        (ingestor, index)
    }

    #[tokio::test]
    async fn test_1750_char_document_yields_three_segments() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (ingestor, index) = setup(embedder.clone());
        let doc = SourceDocument::new("y".repeat(1750), ChunkMetadata::file("big.txt", "text"));

        let n = ingestor.ingest(&[doc]).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(index.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_never_calls_embedder() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (ingestor, index) = setup(embedder.clone());
        assert_eq!(ingestor.ingest(&[]).await.unwrap(), 0);

        let blanks = vec![
            SourceDocument::new("   ", ChunkMetadata::file("a.txt", "text")),
            SourceDocument::new("\n\n", ChunkMetadata::file("b.txt", "text")),
        ];
        assert_eq!(ingestor.ingest(&blanks).await.unwrap(), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_one_embedding_call_for_whole_batch() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (ingestor, _index) = setup(embedder.clone());
        let docs = vec![
            SourceDocument::new("z".repeat(1500), ChunkMetadata::file("a.txt", "text")),
            SourceDocument::new("   ", ChunkMetadata::file("blank.txt", "text")),
            SourceDocument::new("short doc", ChunkMetadata::url("https://x", "html")),
        ];
        let n = ingestor.ingest(&docs).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_segments_carry_their_document_metadata() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (ingestor, index) = setup(embedder);
        let file_meta = ChunkMetadata::file("a.txt", "text");
        let url_meta = ChunkMetadata::url("https://x", "html");
        let docs = vec![
            SourceDocument::new("q".repeat(1200), file_meta.clone()),
            SourceDocument::new("page body", url_meta.clone()),
        ];
        ingestor.ingest(&docs).await.unwrap();

        let listed = index.list_all_metadata().await.unwrap();
        assert_eq!(listed, vec![file_meta.clone(), file_meta, url_meta]);

        let urls = index
            .search("page body", 10, Some(&MetadataFilter::source_type("url")))
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].text, "page body");
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_batch() {
        let embedder = Arc::new(CountingEmbedder {
            fail: true,
            ..Default::default()
        });
        let (ingestor, index) = setup(embedder);
        let doc = SourceDocument::new("content", ChunkMetadata::file("a.txt", "text"));
        let err = ingestor.ingest(&[doc]).await.unwrap_err();
        assert!(matches!(err, CoreError::EmbeddingProvider(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_rejects_invalid_params() {
        let embedder = Arc::new(CountingEmbedder::default());
        let index = Arc::new(InMemoryIndex::new(embedder.clone()));
        let params = ChunkParams {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(Ingestor::new(embedder, index, params).is_err());
    }
}
