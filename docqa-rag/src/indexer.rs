//! Chunk store adapter: batched, failure-tolerant indexing.
//!
//! [`ChunkIndexer`] partitions chunks into batches, drops empty chunks,
//! attaches store metadata and submits each batch as one `add` call. A failed
//! batch is logged and skipped; the remaining batches still run.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, Metadata, chunk_metadata};

/// Default number of chunks per store call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A batch the store refused.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchFailure {
    /// Zero-based batch number.
    pub batch: usize,
    /// Number of non-empty chunks the batch carried.
    pub chunks: usize,
    /// The store's error message.
    pub reason: String,
}

/// Outcome of one [`ChunkIndexer::index`] call.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IndexReport {
    /// Chunks the store accepted.
    pub stored: usize,
    /// Chunks skipped because their trimmed text was empty.
    pub dropped_empty: usize,
    /// Batches the store rejected.
    pub failed_batches: Vec<BatchFailure>,
}

impl IndexReport {
    /// Whether every non-empty chunk was stored.
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Submits chunks to a shared [`ChunkStore`] in batches.
#[derive(Clone)]
pub struct ChunkIndexer {
    store: Arc<dyn ChunkStore>,
    batch_size: usize,
}

impl ChunkIndexer {
    /// Create an indexer writing to `store` in batches of `batch_size`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `batch_size` is zero.
    pub fn new(store: Arc<dyn ChunkStore>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        Ok(Self { store, batch_size })
    }

    /// The configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Index `chunks`, returning how many the store accepted.
    ///
    /// Chunks with empty trimmed text are dropped. Chunks without an id get
    /// `"{document_id}_{chunk_index}"`. The store is not contacted at all for
    /// empty input or for batches that end up empty.
    pub async fn index(&self, chunks: &[Chunk]) -> IndexReport {
        let mut report = IndexReport::default();
        if chunks.is_empty() {
            debug!("no chunks to index");
            return report;
        }

        for (batch, window) in chunks.chunks(self.batch_size).enumerate() {
            let mut documents = Vec::with_capacity(window.len());
            let mut metadatas: Vec<Metadata> = Vec::with_capacity(window.len());
            let mut ids = Vec::with_capacity(window.len());

            for chunk in window {
                if chunk.text.trim().is_empty() {
                    report.dropped_empty += 1;
                    continue;
                }
                let id = if chunk.chunk_id.trim().is_empty() {
                    chunk.document_id.chunk_id(chunk.chunk_index)
                } else {
                    chunk.chunk_id.clone()
                };
                documents.push(chunk.text.clone());
                metadatas.push(chunk_metadata(chunk));
                ids.push(id);
            }

            if documents.is_empty() {
                continue;
            }

            match self.store.add(&documents, &metadatas, &ids).await {
                Ok(()) => {
                    report.stored += documents.len();
                    debug!(
                        batch,
                        batch_len = documents.len(),
                        total = report.stored,
                        "added batch"
                    );
                }
                Err(e) => {
                    warn!(
                        backend = self.store.backend(),
                        batch,
                        batch_len = documents.len(),
                        error = %e,
                        "store rejected batch, continuing with the next one"
                    );
                    report.failed_batches.push(BatchFailure {
                        batch,
                        chunks: documents.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            stored = report.stored,
            dropped_empty = report.dropped_empty,
            failed_batches = report.failed_batches.len(),
            "indexing finished"
        );
        report
    }
}
