//! The chunk store contract.
//!
//! The store is the external similarity-indexed persistence layer. It owns
//! embedding and ranking; this crate only relies on the two operations below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Chunk;
use crate::error::Result;

/// Flat key/value metadata attached to each stored document.
pub type Metadata = Map<String, Value>;

/// Metadata keys written for every chunk.
pub mod keys {
    /// Display name of the source document.
    pub const SOURCE: &str = "source";
    /// Document id.
    pub const DOC_ID: &str = "doc_id";
    /// Ordinal of the chunk within its document (integer).
    pub const CHUNK_INDEX: &str = "chunk_index";
    /// RFC 3339 creation time.
    pub const UPLOAD_TIMESTAMP: &str = "upload_timestamp";
    /// Detected source encoding.
    pub const ENCODING_USED: &str = "encoding_used";
    /// Chunk length in characters (integer).
    pub const CHUNK_LENGTH: &str = "chunk_length";
}

/// Build the store metadata for a chunk.
pub fn chunk_metadata(chunk: &Chunk) -> Metadata {
    let mut metadata = Map::new();
    metadata.insert(keys::SOURCE.into(), Value::from(chunk.source_document_name.as_str()));
    metadata.insert(keys::DOC_ID.into(), Value::from(chunk.document_id.as_str()));
    metadata.insert(keys::CHUNK_INDEX.into(), Value::from(chunk.chunk_index));
    metadata.insert(keys::UPLOAD_TIMESTAMP.into(), Value::from(chunk.created_at.to_rfc3339()));
    metadata.insert(keys::ENCODING_USED.into(), Value::from(chunk.encoding.as_str()));
    metadata.insert(keys::CHUNK_LENGTH.into(), Value::from(chunk.length));
    metadata
}

/// Ranked results of [`ChunkStore::query`].
///
/// Each field holds one inner list per query text, and the inner lists are
/// parallel: position `i` of `ids`, `documents`, `metadatas` and `distances`
/// describes the same hit. Hits are ordered best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreQueryResult {
    /// Stored ids of the hits.
    pub ids: Vec<Vec<String>>,
    /// Stored texts of the hits.
    pub documents: Vec<Vec<String>>,
    /// Stored metadata of the hits.
    pub metadatas: Vec<Vec<Metadata>>,
    /// Distance of each hit from the query (lower is closer).
    #[serde(default)]
    pub distances: Vec<Vec<f32>>,
}

/// A similarity-indexed document store.
///
/// Implementations must be safe to call concurrently; callers share one
/// handle between indexing and retrieval without extra locking.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Short backend name used in error messages.
    fn backend(&self) -> &str;

    /// Add documents with parallel metadata and ids as one atomic call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWriteError`](crate::RagError::StoreWriteError)
    /// if the batch was not persisted.
    async fn add(&self, documents: &[String], metadatas: &[Metadata], ids: &[String])
    -> Result<()>;

    /// Return up to `n_results` hits for each query text, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`](crate::RagError::RetrievalError)
    /// if the store cannot be queried.
    async fn query(&self, query_texts: &[&str], n_results: usize) -> Result<StoreQueryResult>;

    /// Number of documents currently stored.
    async fn count(&self) -> Result<usize>;
}
