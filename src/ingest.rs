//! Foreground ingestion commands for the CLI.
//!
//! Unlike the HTTP endpoints, these run chunk/embed/store to completion
//! before returning and print the number of segments written. Items that
//! cannot be extracted or fetched are logged and skipped; the rest of the
//! batch is still ingested.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use knowledge_copilot_core::models::{ChunkMetadata, SourceDocument};

use crate::copilot::Copilot;
use crate::extract::{extract_path, fetch_url_text};

const UPLOAD_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

/// Files named by `paths`; directories are walked for supported extensions.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && has_upload_extension(e.path()))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

fn has_upload_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| UPLOAD_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub async fn run_ingest_paths(copilot: &Copilot, paths: &[PathBuf]) -> Result<()> {
    let files = expand_paths(paths);
    let mut documents = Vec::with_capacity(files.len());
    let mut skipped = 0usize;

    for path in &files {
        match extract_path(path) {
            Ok((text, content_type)) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                documents.push(SourceDocument::new(text, ChunkMetadata::file(name, content_type)));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                skipped += 1;
            }
        }
    }

    let segments = copilot.ingest(&documents).await?;
    println!(
        "Ingested {} segments from {} files ({} skipped).",
        segments,
        documents.len(),
        skipped
    );
    Ok(())
}

pub async fn run_ingest_urls(copilot: &Copilot, urls: &[String]) -> Result<()> {
    let mut documents = Vec::with_capacity(urls.len());
    let mut skipped = 0usize;

    for url in urls {
        match fetch_url_text(copilot.http(), url).await {
            Ok(text) => documents.push(SourceDocument::new(text, ChunkMetadata::url(url, "html"))),
            Err(e) => {
                warn!(url = %url, error = %e, "skipping url");
                skipped += 1;
            }
        }
    }

    let segments = copilot.ingest(&documents).await?;
    println!(
        "Ingested {} segments from {} urls ({} skipped).",
        segments,
        documents.len(),
        skipped
    );
    Ok(())
}

pub async fn run_mirror_sync(copilot: &Copilot, repo_url: Option<&str>) -> Result<()> {
    let segments = copilot.sync_mirror(repo_url).await?;
    println!("Ingested {} segments from the mirror.", segments);
    Ok(())
}
