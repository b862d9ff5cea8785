//! Local mirror of repository documentation.
//!
//! A mirror is a directory that some external process keeps filled with a
//! repository's README and docs. [`MirrorClient`] reads `.md`/`.txt` files
//! from it and feeds them through the normal ingestion pipeline.
//!
//! An absent `[mirror] root` is the explicit [`MirrorStatus::Unconfigured`]
//! state, distinct from a configured root that does not exist yet or holds
//! no documents.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use knowledge_copilot_core::ingest::Ingestor;
use knowledge_copilot_core::models::{ChunkMetadata, SourceDocument};

const ASSET_GLOBS: &[&str] = &["**/*.md", "**/*.MD", "**/*.txt", "**/*.TXT"];
const EXCLUDED_GLOBS: &[&str] = &["**/.git/**", "**/node_modules/**"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MirrorStatus {
    Unconfigured,
    Missing { root: PathBuf },
    Ready { root: PathBuf, assets: usize },
}

#[derive(Debug, Clone)]
pub struct MirrorClient {
    root: Option<PathBuf>,
}

impl MirrorClient {
    pub fn new(root: Option<PathBuf>) -> Self {
        if root.is_none() {
            warn!("mirror root not configured; mirror sync is disabled");
        }
        Self { root }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn status(&self) -> Result<MirrorStatus> {
        let Some(root) = &self.root else {
            return Ok(MirrorStatus::Unconfigured);
        };
        if !root.is_dir() {
            return Ok(MirrorStatus::Missing { root: root.clone() });
        }
        Ok(MirrorStatus::Ready {
            root: root.clone(),
            assets: self.asset_paths(root)?.len(),
        })
    }

    fn asset_paths(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let include = build_globset(ASSET_GLOBS)?;
        let exclude = build_globset(EXCLUDED_GLOBS)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable mirror entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if exclude.is_match(relative) || !include.is_match(relative) {
                continue;
            }
            paths.push(entry.into_path());
        }
        paths.sort();
        Ok(paths)
    }

    /// `(file name, text)` for every markdown/text asset, sorted by path.
    ///
    /// Unconfigured or missing roots yield no assets. Files that cannot be
    /// read as UTF-8 are logged and skipped.
    pub fn fetch_markdown_assets(&self) -> Result<Vec<(String, String)>> {
        let Some(root) = self.root.as_deref().filter(|r| r.is_dir()) else {
            return Ok(Vec::new());
        };

        let mut assets = Vec::new();
        for path in self.asset_paths(root)? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match std::fs::read_to_string(&path) {
                Ok(text) => assets.push((name, text)),
                Err(e) => warn!(path = %path.display(), error = %e, "failed reading mirror asset"),
            }
        }
        Ok(assets)
    }

    /// Ingest every mirrored asset, attributing it to `repo_url`.
    ///
    /// Returns the number of segments written. Nothing is de-duplicated
    /// against earlier syncs.
    pub async fn sync_repo(&self, repo_url: &str, ingestor: &Ingestor) -> Result<usize> {
        info!(repo_url, "syncing repository via mirror");
        let assets = self.fetch_markdown_assets()?;
        if assets.is_empty() {
            warn!(repo_url, "no mirror assets found");
            return Ok(0);
        }

        let documents: Vec<SourceDocument> = assets
            .into_iter()
            .map(|(name, text)| SourceDocument::new(text, ChunkMetadata::mirror(name, repo_url)))
            .collect();
        let segments = ingestor.ingest(&documents).await?;
        info!(repo_url, documents = documents.len(), segments, "mirror sync complete");
        Ok(segments)
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_copilot_core::chunk::ChunkParams;
    use knowledge_copilot_core::embedding::Embedder;
    use knowledge_copilot_core::models::SourceType;
    use knowledge_copilot_core::store::memory::InMemoryIndex;
    use knowledge_copilot_core::store::VectorIndex;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait::async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        async fn embed(&self, texts: &[String]) -> knowledge_copilot_core::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn populated_mirror() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join("README.md"), "# Project\nSetup steps.").unwrap();
        std::fs::write(tmp.path().join("docs/guide.txt"), "Deploy on Fridays.").unwrap();
        std::fs::write(tmp.path().join("docs/logo.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(tmp.path().join(".git/notes.md"), "internal").unwrap();
        tmp
    }

    #[test]
    fn test_status_states() {
        assert_eq!(
            MirrorClient::new(None).status().unwrap(),
            MirrorStatus::Unconfigured
        );

        let missing = PathBuf::from("/no/such/mirror");
        assert_eq!(
            MirrorClient::new(Some(missing.clone())).status().unwrap(),
            MirrorStatus::Missing { root: missing }
        );

        let empty = TempDir::new().unwrap();
        assert_eq!(
            MirrorClient::new(Some(empty.path().to_path_buf()))
                .status()
                .unwrap(),
            MirrorStatus::Ready {
                root: empty.path().to_path_buf(),
                assets: 0
            }
        );
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(MirrorStatus::Unconfigured).unwrap();
        assert_eq!(json, serde_json::json!({"state": "unconfigured"}));
    }

    #[test]
    fn test_fetch_only_markdown_and_text() {
        let tmp = populated_mirror();
        let client = MirrorClient::new(Some(tmp.path().to_path_buf()));
        let assets = client.fetch_markdown_assets().unwrap();
        let names: Vec<&str> = assets.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["README.md", "guide.txt"]);
        assert_eq!(assets[1].1, "Deploy on Fridays.");
    }

    #[tokio::test]
    async fn test_sync_repo_tags_mirror_metadata() {
        let tmp = populated_mirror();
        let client = MirrorClient::new(Some(tmp.path().to_path_buf()));
        let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);
        let index = Arc::new(InMemoryIndex::new(embedder.clone()));
        let ingestor = Ingestor::new(embedder, index.clone(), ChunkParams::default()).unwrap();

        let n = client
            .sync_repo("https://github.com/acme/handbook", &ingestor)
            .await
            .unwrap();
        assert_eq!(n, 2);

        let metas = index.list_all_metadata().await.unwrap();
        assert!(metas.iter().all(|m| m.source_type == SourceType::McpMirror
            && m.url.as_deref() == Some("https://github.com/acme/handbook")
            && m.content_type == "markdown"));
    }

    #[tokio::test]
    async fn test_sync_unconfigured_is_noop() {
        let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);
        let index = Arc::new(InMemoryIndex::new(embedder.clone()));
        let ingestor = Ingestor::new(embedder, index.clone(), ChunkParams::default()).unwrap();
        let n = MirrorClient::new(None)
            .sync_repo("https://x", &ingestor)
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(index.is_empty());
    }
}
