//! # Knowledge Copilot Core
//!
//! Runtime-free logic for Knowledge Copilot: data models, the sliding-window
//! chunker, the embedding and vector index traits, the ingestion
//! orchestrator, and context-window assembly.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Concrete
//! embedding providers and persistent indexes live in the `knowledge-copilot`
//! application crate and are handed to the types here by constructor
//! injection.
//!
//! ```text
//! raw text ──▶ chunk ──▶ Embedder ──▶ VectorIndex::add
//!                                          │
//! query ──▶ VectorIndex::search ──▶ Retriever::assemble ──▶ context
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod sources;
pub mod store;

pub use error::{CoreError, Result};
