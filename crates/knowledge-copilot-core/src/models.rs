//! Core data models that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Coarse category attached to every ingested segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "mcp-mirror")]
    McpMirror,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Url => "url",
            SourceType::McpMirror => "mcp-mirror",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SourceType::File),
            "url" => Ok(SourceType::Url),
            "mcp-mirror" => Ok(SourceType::McpMirror),
            other => Err(CoreError::invalid_config(format!(
                "unknown source type '{}': expected file, url, or mcp-mirror",
                other
            ))),
        }
    }
}

/// Metadata stamped on every segment of a parent document.
///
/// Written once at insertion and never updated. All segments cut from the
/// same document carry identical copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl ChunkMetadata {
    /// Metadata for an uploaded or local file.
    pub fn file(file_name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::File,
            file_name: Some(file_name.into()),
            url: None,
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }

    /// Metadata for a fetched web page.
    pub fn url(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Url,
            file_name: None,
            url: Some(url.into()),
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }

    /// Metadata for an asset pulled from a repository mirror.
    pub fn mirror(asset_name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::McpMirror,
            file_name: Some(asset_name.into()),
            url: Some(repo_url.into()),
            content_type: "markdown".to_string(),
            created_at: Utc::now(),
        }
    }

    /// String value of a metadata key, as used by [`MetadataFilter`].
    ///
    /// Returns `None` both for unknown keys and for unset optional fields.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "source_type" => Some(self.source_type.as_str().to_string()),
            "file_name" => self.file_name.clone(),
            "url" => self.url.clone(),
            "content_type" => Some(self.content_type.clone()),
            "created_at" => Some(self.created_at.to_rfc3339()),
            _ => None,
        }
    }

    /// Logical source name: the file name, then the URL, then `"unknown"`.
    pub fn source_name(&self) -> &str {
        self.file_name
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or("unknown")
    }
}

/// Metadata keys a [`MetadataFilter`] may constrain.
pub const FILTERABLE_KEYS: &[&str] = &["source_type", "file_name", "url", "content_type"];

/// Conjunctive exact-match constraint over metadata fields.
///
/// Every `(key, value)` pair must match. There is no OR or range form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter(BTreeMap<String, String>);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_type(source_type: &str) -> Self {
        Self::new().with("source_type", source_type)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject keys outside [`FILTERABLE_KEYS`].
    ///
    /// Every index backend calls this before searching, so an unknown key
    /// fails the same way everywhere instead of matching nothing.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.0.keys().find(|k| !FILTERABLE_KEYS.contains(&k.as_str())) {
            Some(key) => Err(CoreError::operation(
                "search",
                format!("unsupported filter key '{}'", key),
            )),
            None => Ok(()),
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.0
            .iter()
            .all(|(k, v)| metadata.field(k).as_deref() == Some(v.as_str()))
    }
}

/// A raw document handed to the ingestion orchestrator.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// The persisted unit of a vector index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// A ranked search hit.
///
/// `score` is a distance: lower means closer. Do not treat it as a
/// similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDoc {
    pub text: String,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
    pub score: f32,
}
