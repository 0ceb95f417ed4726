//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document bytes are not a valid instance of the declared format.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The document decoded fine but has no usable text.
    #[error("Empty content: {0}")]
    EmptyContent(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A batch could not be written to the chunk store.
    #[error("Store write error ({backend}): {message}")]
    StoreWriteError {
        /// The store backend that rejected the write.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The store was unreachable or returned a malformed result.
    #[error("Retrieval error ({backend}): {message}")]
    RetrievalError {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed.
    #[error("Generation error ({backend}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend did not answer in time.
    #[error("Generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    /// The caller supplied an invalid request (for example `top_k == 0`).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An indexing job for this document is already running.
    #[error("Document '{0}' is already being indexed")]
    DocumentBusy(String),

    /// A background task panicked or was dropped before completing.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl RagError {
    pub(crate) fn store_write(backend: &str, message: impl Into<String>) -> Self {
        Self::StoreWriteError { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn retrieval(backend: &str, message: impl Into<String>) -> Self {
        Self::RetrievalError { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn generation(backend: &str, message: impl Into<String>) -> Self {
        Self::GenerationError { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
