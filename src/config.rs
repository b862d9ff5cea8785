//! TOML configuration.
//!
//! The configuration is loaded once at startup by [`load_config`] and then
//! passed explicitly (by reference or `Arc`) to every component that needs
//! it. Every section is optional and falls back to the defaults below.
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! top_k = 4
//! max_context_chars = 6000
//!
//! [index]
//! path = "./data/index"            # or: url = "http://localhost:8000"
//! collection = "company-knowledge"
//!
//! [embedding]
//! provider = "openai"              # openai | ollama | disabled
//! model = "text-embedding-3-small"
//!
//! [generation]
//! model = "gpt-4o-mini"
//!
//! [mirror]
//! root = "./data/mirror"
//! repo_url = "https://github.com/acme/handbook"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! allowed_origins = ["*"]
//! ```
//!
//! API keys are read from the environment (`OPENAI_API_KEY`), never from
//! this file.

use anyhow::{bail, Context, Result};
use knowledge_copilot_core::chunk::{ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use knowledge_copilot_core::retrieve::{DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_TOP_K};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.chunk_overlap).context("invalid [chunking] section")
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_max_context_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}

/// Where the vector index lives. `path` and `url` are mutually exclusive.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Local persisted directory (SQLite).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Remote Chroma-compatible endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: None,
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "company-knowledge".to_string()
}

/// Resolved index connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    Local(PathBuf),
    Remote(String),
}

impl IndexConfig {
    pub fn target(&self) -> Result<IndexTarget> {
        match (&self.path, &self.url) {
            (Some(_), Some(_)) => bail!("index.path and index.url are mutually exclusive"),
            (None, Some(url)) if url.trim().is_empty() => bail!("index.url must not be empty"),
            (None, Some(url)) => Ok(IndexTarget::Remote(url.clone())),
            (Some(path), None) => Ok(IndexTarget::Local(path.clone())),
            (None, None) => Ok(IndexTarget::Local(PathBuf::from("./data/index"))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL; defaults per provider.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            api_base: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> &str {
        match (self.api_base.as_deref(), self.provider.as_str()) {
            (Some(base), _) => base,
            (None, "ollama") => DEFAULT_OLLAMA_URL,
            (None, _) => DEFAULT_OPENAI_BASE,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
            api_base: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn base_url(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_OPENAI_BASE)
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_generation_timeout() -> u64 {
    60
}

/// Local mirror of repository docs. No `root` means the mirror is
/// unconfigured, which is reported as such rather than as "empty".
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MirrorConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Label recorded as `url` on mirrored segments; defaults to `file://<root>`.
    #[serde(default)]
    pub repo_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.chunking.params()?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.max_context_chars == 0 {
            bail!("retrieval.max_context_chars must be >= 1");
        }

        self.index.target()?;
        if self.index.collection.trim().is_empty() {
            bail!("index.collection must not be empty");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Read, parse, and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
