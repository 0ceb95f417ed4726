//! Retriever: turns a query into ranked [`RetrievedChunk`]s.
//!
//! Ranking belongs to the store. The retriever only builds the store query
//! and maps each hit, in the store's order, into a [`RetrievedChunk`]. A hit
//! missing required metadata fails the whole search rather than being
//! dropped.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::{Query, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, Metadata, StoreQueryResult, keys};

/// Searches a shared [`ChunkStore`].
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
}

impl Retriever {
    /// Create a retriever over `store`.
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    /// Return at most `top_k` chunks relevant to `query_text`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidRequest`] if `top_k` is zero, and
    /// [`RagError::RetrievalError`] if the store fails or returns a malformed
    /// result.
    pub async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let query = Query::new(query_text, top_k)?;
        self.search_query(&query).await
    }

    /// Like [`search`](Self::search) for an already validated [`Query`].
    pub async fn search_query(&self, query: &Query) -> Result<Vec<RetrievedChunk>> {
        let backend = self.store.backend().to_string();
        let result = self.store.query(&[query.text.as_str()], query.top_k).await.map_err(|e| {
            error!(backend = %backend, error = %e, "store query failed");
            match e {
                RagError::RetrievalError { .. } => e,
                other => RagError::retrieval(&backend, other.to_string()),
            }
        })?;

        let chunks = map_result(&backend, result)?;
        if chunks.len() > query.top_k {
            return Err(RagError::retrieval(
                &backend,
                format!("store returned {} results for top_k {}", chunks.len(), query.top_k),
            ));
        }
        debug!(result_count = chunks.len(), top_k = query.top_k, "search completed");
        Ok(chunks)
    }
}

/// Map the first query row of `result` into retrieved chunks.
fn map_result(backend: &str, result: StoreQueryResult) -> Result<Vec<RetrievedChunk>> {
    let mut documents = result.documents.into_iter();
    let mut metadatas = result.metadatas.into_iter();
    let (documents, metadatas) = match (documents.next(), metadatas.next()) {
        (Some(documents), Some(metadatas)) => (documents, metadatas),
        (None, None) => return Ok(Vec::new()),
        _ => {
            return Err(RagError::retrieval(backend, "documents and metadatas rows do not match"));
        }
    };
    if documents.len() != metadatas.len() {
        return Err(RagError::retrieval(
            backend,
            format!("{} documents but {} metadatas", documents.len(), metadatas.len()),
        ));
    }

    documents
        .into_iter()
        .zip(metadatas)
        .enumerate()
        .map(|(rank, (text, metadata))| to_retrieved(backend, rank, text, &metadata))
        .collect()
}

fn to_retrieved(
    backend: &str,
    rank: usize,
    text: String,
    metadata: &Metadata,
) -> Result<RetrievedChunk> {
    let source = metadata.get(keys::SOURCE).and_then(|v| v.as_str()).ok_or_else(|| {
        RagError::retrieval(backend, format!("result {rank} has no string '{}'", keys::SOURCE))
    })?;
    let chunk_index = metadata
        .get(keys::CHUNK_INDEX)
        .and_then(|v| v.as_u64())
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            RagError::retrieval(
                backend,
                format!("result {rank} has no integer '{}'", keys::CHUNK_INDEX),
            )
        })?;
    Ok(RetrievedChunk { text, source_document_name: source.to_string(), chunk_index })
}
