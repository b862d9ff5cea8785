//! Similarity retrieval and context-window assembly.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{MetadataFilter, RetrievedDoc};
use crate::store::VectorIndex;

/// Separator placed between segments in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// Filtered similarity search over a [`VectorIndex`].
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Top `k` segments for `query`, in the index's ranking order.
    ///
    /// A non-empty `source_filter` restricts results to that `source_type`.
    /// An empty string is treated the same as `None`. Index failures abort
    /// the query; no partial result is returned.
    pub async fn fetch(
        &self,
        query: &str,
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<RetrievedDoc>> {
        let filter = source_filter
            .filter(|s| !s.is_empty())
            .map(MetadataFilter::source_type);
        let docs = self.index.search(query, k, filter.as_ref()).await?;
        debug!(k, returned = docs.len(), filter = ?source_filter, "fetched context candidates");
        Ok(docs)
    }

    /// See [`assemble_context`].
    pub fn assemble(&self, docs: &[RetrievedDoc], max_chars: usize) -> String {
        assemble_context(docs, max_chars)
    }
}

/// Join distinct segment texts under a character budget.
///
/// Walks `docs` in order, skipping exact duplicates of text already
/// included. The first doc whose text would push the running total past
/// `max_chars` ends the walk; later, smaller docs are not tried. Included
/// texts are joined with [`CONTEXT_SEPARATOR`], whose length is not charged
/// against the budget.
///
/// ```rust
/// use knowledge_copilot_core::retrieve::assemble_context;
/// use knowledge_copilot_core::models::{ChunkMetadata, RetrievedDoc};
///
/// let doc = |t: &str| RetrievedDoc {
///     text: t.to_string(),
///     metadata: ChunkMetadata::file("a.md", "text"),
///     score: 0.0,
/// };
/// let ctx = assemble_context(&[doc("snippet"), doc("snippet"), doc("another")], 15);
/// assert_eq!(ctx, "snippet\n---\nanother");
/// ```
pub fn assemble_context(docs: &[RetrievedDoc], max_chars: usize) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut parts: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for doc in docs {
        let text = doc.text.as_str();
        if seen.contains(text) {
            continue;
        }
        let len = text.chars().count();
        if total + len > max_chars {
            break;
        }
        parts.push(text);
        seen.insert(text);
        total += len;
    }

    parts.join(CONTEXT_SEPARATOR)
}
