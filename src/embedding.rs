//! Remote embedding providers.
//!
//! Implementations of [`Embedder`] backed by HTTP services:
//! - **[`OpenAiEmbedder`]**: `POST {api_base}/embeddings` (OpenAI-compatible).
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama.
//! - **[`DisabledEmbedder`]**: always fails; for deployments without a provider.
//!
//! Use [`create_embedder`] to pick one from [`EmbeddingConfig`].
//!
//! Requests are sent once. Transport failures and non-2xx responses surface
//! as [`CoreError::EmbeddingProvider`] without retrying; the caller decides
//! whether to try the batch again.

use anyhow::{bail, Result as AnyResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use knowledge_copilot_core::embedding::{ensure_parallel, Embedder};
use knowledge_copilot_core::{CoreError, Result};

use crate::config::EmbeddingConfig;

/// Embedder for deployments with no provider configured.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(CoreError::embedding(
            "embeddings are disabled; set [embedding] provider in the config",
        ))
    }
}

// ============ OpenAI ============

/// OpenAI-compatible embeddings client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    model: String,
    api_base: String,
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(
        model: impl Into<String>,
        api_base: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> AnyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            model: model.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from config, reading `OPENAI_API_KEY` from the environment.
    ///
    /// A missing key is not an error here; it is reported on the first
    /// embedding call so that the rest of the service can still start.
    pub fn from_config(config: &EmbeddingConfig) -> AnyResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        Self::new(
            config.model.clone(),
            config.base_url(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::embedding("OPENAI_API_KEY environment variable not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::embedding(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::embedding(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::embedding(format!("Invalid OpenAI response: {}", e)))?;
        let vectors = parse_openai_response(&json)?;
        ensure_parallel(texts.len(), &vectors)?;

        debug!(count = vectors.len(), model = %self.model, "embedded batch");
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| CoreError::embedding("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| CoreError::embedding("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embeddings from a local Ollama instance.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaEmbedder {
    pub fn new(model: impl Into<String>, url: impl Into<String>, timeout: Duration) -> AnyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            model: model.into(),
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> AnyResult<Self> {
        Self::new(
            config.model.clone(),
            config.base_url(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CoreError::embedding(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::embedding(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::embedding(format!("Invalid Ollama response: {}", e)))?;
        let vectors = parse_ollama_response(&json)?;
        ensure_parallel(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| CoreError::embedding("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| {
                    CoreError::embedding("Invalid Ollama response: embedding is not an array")
                })
        })
        .collect()
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> AnyResult<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_config(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::from_config(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
