//! Service wiring shared by the HTTP server and the CLI.
//!
//! [`Copilot`] owns one instance of every collaborator (embedder, index,
//! ingestor, retriever, generator, mirror) built from a [`Config`]. Each
//! collaborator receives its dependencies through its constructor; nothing
//! here reads global state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use knowledge_copilot_core::embedding::Embedder;
use knowledge_copilot_core::ingest::Ingestor;
use knowledge_copilot_core::models::{RetrievedDoc, SourceDocument, SourceType};
use knowledge_copilot_core::retrieve::Retriever;
use knowledge_copilot_core::sources::{summarize, SourceSummary};
use knowledge_copilot_core::store::VectorIndex;
use knowledge_copilot_core::CoreError;

use crate::chroma_index::ChromaIndex;
use crate::config::{Config, IndexTarget};
use crate::embedding::create_embedder;
use crate::generate::{AnswerGenerator, GenerationError, OpenAiChat};
use crate::mirror::{MirrorClient, MirrorStatus};
use crate::sqlite_index::SqliteIndex;

/// Characters of segment text echoed back with each cited source.
pub const SNIPPET_CHARS: usize = 280;

/// Open the index named by `[index]`, injecting `embedder`.
pub async fn open_index(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorIndex>, CoreError> {
    let target = config
        .index
        .target()
        .map_err(|e| CoreError::invalid_config(e.to_string()))?;
    match target {
        IndexTarget::Local(path) => Ok(Arc::new(SqliteIndex::open(&path, embedder).await?)),
        IndexTarget::Remote(url) => Ok(Arc::new(
            ChromaIndex::open(
                &url,
                &config.index.collection,
                embedder,
                Duration::from_secs(config.embedding.timeout_secs),
            )
            .await?,
        )),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub enable_mcp: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_type: None,
            top_k: None,
            enable_mcp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    pub name: String,
    pub source_type: SourceType,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<CitedSource>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("mirror sync failed: {0}")]
    Mirror(anyhow::Error),
}

/// Citation list for `docs`, numbered from 1 in ranking order.
pub fn cite_sources(docs: &[RetrievedDoc]) -> Vec<CitedSource> {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| CitedSource {
            name: doc
                .metadata
                .file_name
                .clone()
                .or_else(|| doc.metadata.url.clone())
                .unwrap_or_else(|| format!("Source {}", i + 1)),
            source_type: doc.metadata.source_type,
            snippet: doc.text.chars().take(SNIPPET_CHARS).collect(),
        })
        .collect()
}

pub struct Copilot {
    config: Arc<Config>,
    ingestor: Ingestor,
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
    mirror: MirrorClient,
    http: reqwest::Client,
}

impl Copilot {
    /// Build every collaborator from `config`.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index = open_index(&config, embedder.clone()).await?;
        let generator = Arc::new(OpenAiChat::from_config(&config.generation)?);
        Self::new(config, embedder, index, generator)
    }

    /// Assemble from explicit collaborators.
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> anyhow::Result<Self> {
        let params = config.chunking.params()?;
        let ingestor = Ingestor::new(embedder, index.clone(), params)?;
        let mirror = MirrorClient::new(config.mirror.root.clone());
        let http = reqwest::Client::builder()
            .user_agent(concat!("knowledge-copilot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            ingestor,
            retriever: Retriever::new(index),
            generator,
            mirror,
            http,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn mirror(&self) -> &MirrorClient {
        &self.mirror
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn ingest(&self, documents: &[SourceDocument]) -> Result<usize, CoreError> {
        self.ingestor.ingest(documents).await
    }

    pub async fn sources(&self) -> Result<Vec<SourceSummary>, CoreError> {
        summarize(self.ingestor.index().as_ref()).await
    }

    pub fn mirror_status(&self) -> anyhow::Result<MirrorStatus> {
        self.mirror.status()
    }

    /// Repository label attached to mirrored segments.
    fn mirror_repo_url(&self) -> Option<String> {
        let root = self.mirror.root()?;
        Some(
            self.config
                .mirror
                .repo_url
                .clone()
                .unwrap_or_else(|| format!("file://{}", root.display())),
        )
    }

    /// Sync the mirror under `repo_url`, or the configured label.
    pub async fn sync_mirror(&self, repo_url: Option<&str>) -> anyhow::Result<usize> {
        let label = match repo_url {
            Some(url) => url.to_string(),
            None => match self.mirror_repo_url() {
                Some(url) => url,
                None => {
                    warn!("mirror sync requested but no mirror root is configured");
                    return Ok(0);
                }
            },
        };
        self.mirror.sync_repo(&label, &self.ingestor).await
    }

    /// Retrieve, assemble and generate a cited answer.
    pub async fn answer(&self, request: &ChatRequest) -> Result<ChatAnswer, ChatError> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if request.enable_mcp {
            info!("syncing mirror before retrieval");
            self.sync_mirror(None).await.map_err(ChatError::Mirror)?;
        }

        let top_k = request
            .top_k
            .filter(|k| *k > 0)
            .unwrap_or(self.config.retrieval.top_k);
        let docs = self
            .retriever
            .fetch(question, top_k, request.source_type.as_deref())
            .await?;
        let context = self
            .retriever
            .assemble(&docs, self.config.retrieval.max_context_chars);
        let answer = self.generator.generate(question, &context).await?;

        info!(top_k, retrieved = docs.len(), context_chars = context.chars().count(), "answered question");
        Ok(ChatAnswer {
            answer,
            sources: cite_sources(&docs),
        })
    }
}
