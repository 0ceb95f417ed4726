//! Bounded worker pool for indexing jobs.
//!
//! Indexing runs off the request path as explicit tasks. A semaphore caps
//! how many jobs touch the store at once, and a per-document guard keeps a
//! document from being indexed twice concurrently.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::document::{Chunk, DocumentId};
use crate::error::{RagError, Result};
use crate::indexer::{ChunkIndexer, IndexReport};

type InFlight = Arc<Mutex<HashSet<DocumentId>>>;

/// Pool of indexing workers with concurrency control.
pub struct IndexingPool {
    indexer: ChunkIndexer,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    in_flight: InFlight,
}

impl IndexingPool {
    /// Create a pool running at most `max_concurrent` jobs at once.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_concurrent` is zero.
    pub fn new(indexer: ChunkIndexer, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(RagError::ConfigError(
                "index_workers must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            indexer,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            in_flight: Arc::default(),
        })
    }

    /// Submit the chunks of one document for indexing.
    ///
    /// The job starts immediately and waits for a free worker slot. Await
    /// the returned [`IndexTask`] to get its [`IndexReport`]; dropping the
    /// handle does not cancel the job.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentBusy`] if a job for `document_id` is still
    /// running.
    pub fn submit(&self, document_id: DocumentId, chunks: Vec<Chunk>) -> Result<IndexTask> {
        let guard = InFlightGuard::claim(&self.in_flight, document_id.clone())?;
        let semaphore = Arc::clone(&self.semaphore);
        let indexer = self.indexer.clone();

        let handle = tokio::spawn(async move {
            let guard = guard;
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return Err(RagError::TaskFailed(format!("indexing pool closed: {e}"))),
            };
            debug!(
                document.id = %guard.document_id,
                chunk_count = chunks.len(),
                "indexing job started"
            );
            Ok(indexer.index(&chunks).await)
        });

        Ok(IndexTask { document_id, handle })
    }

    /// Free worker slots right now.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Maximum number of concurrent jobs.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of documents with a job queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Marks a document as being indexed until dropped.
struct InFlightGuard {
    set: InFlight,
    document_id: DocumentId,
}

impl InFlightGuard {
    fn claim(set: &InFlight, document_id: DocumentId) -> Result<Self> {
        let mut documents = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !documents.insert(document_id.clone()) {
            return Err(RagError::DocumentBusy(document_id.to_string()));
        }
        Ok(Self { set: Arc::clone(set), document_id })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.document_id);
    }
}

/// Handle to a submitted indexing job; resolves to its [`IndexReport`].
pub struct IndexTask {
    document_id: DocumentId,
    handle: JoinHandle<Result<IndexReport>>,
}

impl IndexTask {
    /// The document this job indexes.
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }
}

impl Future for IndexTask {
    type Output = Result<IndexReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| Err(RagError::TaskFailed(format!("indexing task: {e}"))))
        })
    }
}
