//! Error taxonomy shared by every pipeline stage.
//!
//! None of these errors are retried inside the core. Callers decide whether
//! a failed batch or query is worth another attempt.

use thiserror::Error;

/// Boxed cause attached to index failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad chunking or retrieval parameters. Raised before any I/O.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding provider was unreachable, rejected the request, or is
    /// not configured.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The backing store could not be reached when the index was built.
    #[error("vector index unavailable: {message}")]
    IndexUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A single add/search/list call failed.
    #[error("vector index operation `{operation}` failed: {source}")]
    IndexOperation {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl CoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        CoreError::EmbeddingProvider(msg.into())
    }

    pub fn unavailable(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::IndexUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn operation(operation: &'static str, source: impl Into<BoxError>) -> Self {
        CoreError::IndexOperation {
            operation,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
