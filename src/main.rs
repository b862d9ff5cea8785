//! # Knowledge Copilot CLI (`kc`)
//!
//! ## Usage
//!
//! ```bash
//! kc --config ./config/kc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kc init` | Create (or open) the configured vector index |
//! | `kc ingest <paths>...` | Extract, chunk, embed and store local files |
//! | `kc ingest-url <urls>...` | Fetch, chunk, embed and store web pages |
//! | `kc ask "<question>"` | Answer a question from the indexed context |
//! | `kc sources` | List indexed sources with chunk counts |
//! | `kc mirror status` | Show whether the repository mirror is configured |
//! | `kc mirror sync <repo-url>` | Ingest every document in the mirror |
//! | `kc serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use knowledge_copilot::config;
use knowledge_copilot::copilot::{open_index, Copilot};
use knowledge_copilot::embedding::create_embedder;
use knowledge_copilot::{ask, ingest, server, sources, telemetry};

/// Knowledge Copilot: ingest company documents and answer questions from them.
#[derive(Parser)]
#[command(name = "kc", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kc.toml")]
    config: PathBuf,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`, `kc=trace`).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or open the vector index.
    ///
    /// Idempotent; running it against an existing index is safe.
    Init,

    /// Ingest local files (.txt, .md, .pdf, .docx). Directories are walked.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Fetch web pages and ingest their visible text.
    IngestUrl {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Restrict retrieval to one source type (`file`, `url`, `mcp-mirror`).
        #[arg(long)]
        source_type: Option<String>,

        /// Number of segments to retrieve (defaults to `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Sync the mirror before retrieving.
        #[arg(long)]
        sync_mirror: bool,
    },

    /// List indexed sources.
    Sources,

    /// Inspect or sync the repository mirror.
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[derive(Subcommand)]
enum MirrorAction {
    /// Report whether the mirror is unconfigured, missing, or ready.
    Status,
    /// Ingest every mirrored document under the given repository URL.
    Sync {
        /// Recorded as `url` on every mirrored segment. Defaults to
        /// `[mirror] repo_url`.
        repo_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(&cli.log_level, cli.json_logs)?;

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let embedder = create_embedder(&cfg.embedding)?;
        open_index(&cfg, embedder).await?;
        println!("Index initialized successfully.");
        return Ok(());
    }

    let copilot = Copilot::from_config(cfg).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Ingest { paths } => {
            ingest::run_ingest_paths(&copilot, &paths).await?;
        }
        Commands::IngestUrl { urls } => {
            ingest::run_ingest_urls(&copilot, &urls).await?;
        }
        Commands::Ask {
            question,
            source_type,
            top_k,
            sync_mirror,
        } => {
            ask::run_ask(&copilot, &question, source_type, top_k, sync_mirror).await?;
        }
        Commands::Sources => {
            sources::list_sources(&copilot).await?;
        }
        Commands::Mirror { action } => match action {
            MirrorAction::Status => {
                sources::print_mirror_status(&copilot)?;
            }
            MirrorAction::Sync { repo_url } => {
                ingest::run_mirror_sync(&copilot, repo_url.as_deref()).await?;
            }
        },
        Commands::Serve => {
            server::run_server(Arc::new(copilot)).await?;
        }
    }

    Ok(())
}
