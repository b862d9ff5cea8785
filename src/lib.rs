//! # Knowledge Copilot
//!
//! A retrieval-augmented knowledge assistant. Documents from uploaded files,
//! web pages and a mirrored repository are chunked, embedded and stored in a
//! vector index; questions are answered by a chat model from the closest
//! segments, with the sources cited.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Sources    │──▶│  Pipeline    │──▶│ Vector index │
//! │ file/url/   │   │ Chunk+Embed  │   │ SQLite or    │
//! │ mirror      │   └──────────────┘   │ Chroma       │
//! └─────────────┘                      └──────┬───────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │   (kc)   │          │  (axum)  │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! The runtime-free pieces (models, chunker, traits, orchestration) live in
//! the `knowledge-copilot-core` crate, re-exported here.
//!
//! ## Quick Start
//!
//! ```bash
//! kc init                               # create the index
//! kc ingest ./handbook                  # ingest local files
//! kc ingest-url https://intranet/faq    # ingest a web page
//! kc ask "How do I request a laptop?"
//! kc serve                              # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`copilot`] | Service wiring and the chat flow |
//! | [`embedding`] | HTTP embedding providers |
//! | [`generate`] | Chat-completion answer generation |
//! | [`extract`] | Upload and web page text extraction |
//! | [`mirror`] | Repository mirror sync |
//! | [`sqlite_index`] | Local persisted vector index |
//! | [`chroma_index`] | Remote Chroma vector index |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub use knowledge_copilot_core;

pub mod ask;
pub mod chroma_index;
pub mod config;
pub mod copilot;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod mirror;
pub mod server;
pub mod sources;
pub mod sqlite_index;
pub mod telemetry;
