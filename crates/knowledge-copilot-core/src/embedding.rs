//! Embedding gateway trait and vector utilities.
//!
//! Defines the [`Embedder`] trait every embedding backend implements, plus
//! pure helpers for vector serialization and distance computation.
//!
//! Concrete providers (OpenAI, Ollama) live in the `knowledge-copilot` app
//! crate.

use async_trait::async_trait;

use crate::error::Result;

/// Maps a batch of strings to fixed-dimension vectors.
///
/// # Contract
///
/// - The output has the same length and order as the input.
/// - `embed(&[])` returns an empty vector and performs no remote call.
/// - A non-empty call performs exactly one batched request, never one
///   request per text.
/// - Failures surface as [`CoreError::EmbeddingProvider`](crate::CoreError)
///   and are not retried by the implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(crate::CoreError::embedding(format!(
                "expected 1 embedding for query, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Check that a provider answered with one vector per input.
pub fn ensure_parallel(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(crate::CoreError::embedding(format!(
            "provider returned {} embeddings for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(())
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use knowledge_copilot_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance, `1 - cosine_similarity`, in `[0.0, 2.0]`.
///
/// Lower is closer. This is the score reported by local indexes.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
