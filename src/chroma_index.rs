//! [`VectorIndex`] backed by a remote Chroma server (REST API v1).
//!
//! Only the `/api/v1` routes are spoken. That covers Chroma 0.4 and 0.5
//! servers. Chroma 1.x serves only `/api/v2` (with tenant and database
//! path segments) and is not supported.
//!
//! The collection is resolved once at open time with `get_or_create`, so
//! an unreachable server is reported up front as
//! [`CoreError::IndexUnavailable`]. Later calls that fail surface as
//! [`CoreError::IndexOperation`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use knowledge_copilot_core::embedding::Embedder;
use knowledge_copilot_core::models::{ChunkMetadata, MetadataFilter, RetrievedDoc};
use knowledge_copilot_core::store::{check_batch, new_ids, resolve_embeddings, VectorIndex};
use knowledge_copilot_core::{CoreError, Result};

pub struct ChromaIndex {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: &'a [String],
    embeddings: &'a [Vec<f32>],
    documents: &'a [String],
    metadatas: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    where_: Option<serde_json::Value>,
    include: [&'static str; 3],
}

/// Chroma nests query results one level per query embedding.
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<serde_json::Value>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    metadatas: Vec<Option<serde_json::Value>>,
}

impl ChromaIndex {
    /// Connect to `base_url` and get or create `collection`.
    pub async fn open(
        base_url: &str,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::unavailable("cannot build HTTP client", e))?;

        let body = serde_json::json!({ "name": collection, "get_or_create": true });
        let response = client
            .post(format!("{}/api/v1/collections", base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::unavailable(format!("cannot reach index at {}", base_url), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::unavailable(
                format!("index at {} refused collection '{}'", base_url, collection),
                format!("HTTP {}: {}", status, text),
            ));
        }
        let created: CollectionResponse = response.json().await.map_err(|e| {
            CoreError::unavailable(format!("unexpected collection response from {}", base_url), e)
        })?;

        info!(url = %base_url, collection, id = %created.id, "opened remote index");
        Ok(Self {
            client,
            base_url,
            collection_id: created.id,
            embedder,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url, self.collection_id, action
        )
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        action: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(action))
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::operation(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::operation(
                operation,
                format!("HTTP {}: {}", status, text),
            ));
        }
        Ok(response)
    }
}

/// Chroma `where` document for a conjunctive filter.
fn where_document(filter: &MetadataFilter) -> Option<serde_json::Value> {
    let clauses: Vec<serde_json::Value> = filter
        .iter()
        .map(|(k, v)| {
            let mut clause = serde_json::Map::new();
            clause.insert(k.to_string(), serde_json::Value::from(v));
            serde_json::Value::Object(clause)
        })
        .collect();
    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(serde_json::json!({ "$and": clauses })),
    }
}

fn decode_metadata(
    operation: &'static str,
    value: Option<serde_json::Value>,
) -> Result<ChunkMetadata> {
    let value = value.ok_or_else(|| CoreError::operation(operation, "record has no metadata"))?;
    serde_json::from_value(value).map_err(|e| CoreError::operation(operation, e))
}

#[async_trait]
impl VectorIndex for ChromaIndex {
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

        let metadatas = metadatas
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CoreError::operation("add", e))?;

        let body = AddRequest {
            ids: &ids,
            embeddings: &vectors,
            documents: texts,
            metadatas,
        };
        self.post("add", "add", &body).await?;

        debug!(count = ids.len(), "added entries to remote index");
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
        let body = QueryRequest {
            query_embeddings: vec![query_vec.as_slice()],
            n_results: k,
            where_: filter.and_then(where_document),
            include: ["documents", "metadatas", "distances"],
        };

        let parsed: QueryResponse = self
            .post("search", "query", &body)
            .await?
            .json()
            .await
            .map_err(|e| CoreError::operation("search", e))?;

        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();

        documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .map(|((text, metadata), score)| {
                Ok(RetrievedDoc {
                    text: text.unwrap_or_default(),
                    metadata: decode_metadata("search", metadata)?,
                    score,
                })
            })
            .collect()
    }

    async fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>> {
        let body = serde_json::json!({ "include": ["metadatas"] });
        let parsed: GetResponse = self
            .post("list", "get", &body)
            .await?
            .json()
            .await
            .map_err(|e| CoreError::operation("list", e))?;

        parsed
            .metadatas
            .into_iter()
            .map(|m| decode_metadata("list", m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_document_shapes() {
        assert_eq!(where_document(&MetadataFilter::new()), None);
        assert_eq!(
            where_document(&MetadataFilter::source_type("url")),
            Some(serde_json::json!({"source_type": "url"}))
        );
        let both = MetadataFilter::source_type("file").with("content_type", "pdf");
        assert_eq!(
            where_document(&both),
            Some(serde_json::json!({"$and": [
                {"content_type": "pdf"},
                {"source_type": "file"}
            ]}))
        );
    }

    #[test]
    fn test_decode_metadata_requires_value() {
        let err = decode_metadata("list", None).unwrap_err();
        assert!(matches!(err, CoreError::IndexOperation { operation: "list", .. }));

        let meta = ChunkMetadata::url("https://docs", "html");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(decode_metadata("list", Some(value)).unwrap(), meta);
    }
}
