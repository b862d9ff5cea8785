//! Per-source summaries built from index metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{ChunkMetadata, SourceType};
use crate::store::VectorIndex;

/// Chunk count for one logical source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    /// File name, else URL, else `"unknown"`.
    pub name: String,
    pub source_type: SourceType,
    pub chunk_count: usize,
    /// `created_at` of the first record seen for this source.
    pub created_at: DateTime<Utc>,
}

/// Group metadata by `(name, source_type)`, keeping first-seen order.
pub fn summarize_metadata(metadatas: &[ChunkMetadata]) -> Vec<SourceSummary> {
    let mut positions: HashMap<(&str, SourceType), usize> = HashMap::new();
    let mut out: Vec<SourceSummary> = Vec::new();

    for meta in metadatas {
        let key = (meta.source_name(), meta.source_type);
        match positions.get(&key) {
            Some(&pos) => out[pos].chunk_count += 1,
            None => {
                positions.insert(key, out.len());
                out.push(SourceSummary {
                    name: meta.source_name().to_string(),
                    source_type: meta.source_type,
                    chunk_count: 1,
                    created_at: meta.created_at,
                });
            }
        }
    }
    out
}

/// Summarize everything in `index`.
///
/// Costs one full [`VectorIndex::list_all_metadata`] scan.
pub async fn summarize(index: &dyn VectorIndex) -> Result<Vec<SourceSummary>> {
    let metadatas = index.list_all_metadata().await?;
    Ok(summarize_metadata(&metadatas))
}
