//! In-memory chunk store using cosine similarity.
//!
//! [`InMemoryChunkStore`] implements [`ChunkStore`] on top of any
//! [`EmbeddingProvider`]. Entries live in a `Vec` behind a
//! `tokio::sync::RwLock`; an optional JSON snapshot file makes the store
//! survive restarts.
//!
//! The snapshot holds the whole collection and is rewritten on every `add`.
//! Writers serialize on a separate mutex; the entries lock is held shared
//! while the snapshot is encoded and released before the file is written, so
//! queries only wait for the in-memory insert.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, Metadata, StoreQueryResult};

const BACKEND: &str = "in-memory";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    document: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// A [`ChunkStore`] that keeps everything in process memory.
///
/// Entries keep insertion order, so equal-distance hits come back in the
/// order they were added.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{HashEmbeddingProvider, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new(Arc::new(HashEmbeddingProvider::default()));
/// store.add(&documents, &metadatas, &ids).await?;
/// let hits = store.query(&["what is ownership?"], 3).await?;
/// ```
pub struct InMemoryChunkStore {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<StoredEntry>>,
    snapshot: Option<PathBuf>,
    /// Held for the whole of an `add`, so snapshots hit disk in insert order.
    writer: Mutex<()>,
}

impl InMemoryChunkStore {
    /// Create an empty, non-persistent store.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_entries(embedder, Vec::new(), None)
    }

    fn with_entries(
        embedder: Arc<dyn EmbeddingProvider>,
        entries: Vec<StoredEntry>,
        snapshot: Option<PathBuf>,
    ) -> Self {
        Self { embedder, entries: RwLock::new(entries), snapshot, writer: Mutex::new(()) }
    }

    /// Open a store persisted as `{dir}/{collection}.json`.
    ///
    /// The directory is created if needed and an existing snapshot is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the directory cannot be created or
    /// the snapshot cannot be read or parsed.
    pub async fn open(
        dir: impl AsRef<Path>,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            RagError::ConfigError(format!("cannot create data dir '{}': {e}", dir.display()))
        })?;

        let path = dir.join(format!("{collection}.json"));
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<StoredEntry>>(&bytes).map_err(|e| {
                RagError::ConfigError(format!("corrupt snapshot '{}': {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(RagError::ConfigError(format!(
                    "cannot read snapshot '{}': {e}",
                    path.display()
                )));
            }
        };

        info!(path = %path.display(), entries = entries.len(), "opened chunk store");
        Ok(Self::with_entries(embedder, entries, Some(path)))
    }

    async fn write_snapshot(&self, bytes: Vec<u8>, entries: usize) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| RagError::store_write(BACKEND, format!("write snapshot: {e}")))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| RagError::store_write(BACKEND, format!("replace snapshot: {e}")))?;
        debug!(path = %path.display(), entries, "snapshot written");
        Ok(())
    }
}

/// Cosine distance `1 - cos(a, b)`; vectors with zero magnitude are at distance 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn add(
        &self,
        documents: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<()> {
        if documents.len() != metadatas.len() || documents.len() != ids.len() {
            return Err(RagError::store_write(
                BACKEND,
                format!(
                    "mismatched batch: {} documents, {} metadatas, {} ids",
                    documents.len(),
                    metadatas.len(),
                    ids.len()
                ),
            ));
        }
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| RagError::store_write(BACKEND, format!("embedding failed: {e}")))?;
        if embeddings.len() != documents.len() {
            return Err(RagError::store_write(
                BACKEND,
                format!("expected {} embeddings, got {}", documents.len(), embeddings.len()),
            ));
        }

        let _writer = self.writer.lock().await;
        let mut entries = self.entries.write().await;
        for (i, id) in ids.iter().enumerate() {
            let duplicate =
                entries.iter().any(|e| &e.id == id) || ids[..i].iter().any(|other| other == id);
            if duplicate {
                return Err(RagError::store_write(BACKEND, format!("duplicate id '{id}'")));
            }
        }

        let previous_len = entries.len();
        entries.extend(documents.iter().zip(metadatas).zip(ids).zip(embeddings).map(
            |(((document, metadata), id), embedding)| StoredEntry {
                id: id.clone(),
                document: document.clone(),
                metadata: metadata.clone(),
                embedding,
            },
        ));

        if self.snapshot.is_none() {
            return Ok(());
        }

        let entries = entries.downgrade();
        let total = entries.len();
        let encoded = serde_json::to_vec(&*entries)
            .map_err(|e| RagError::store_write(BACKEND, format!("serialize snapshot: {e}")));
        drop(entries);

        let written = match encoded {
            Ok(bytes) => self.write_snapshot(bytes, total).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // The batch did not persist; drop it from memory too. No other
            // writer can have appended since `_writer` is still held.
            self.entries.write().await.truncate(previous_len);
            return Err(e);
        }
        Ok(())
    }

    async fn query(&self, query_texts: &[&str], n_results: usize) -> Result<StoreQueryResult> {
        let embeddings = self
            .embedder
            .embed_batch(query_texts)
            .await
            .map_err(|e| RagError::retrieval(BACKEND, format!("query embedding failed: {e}")))?;

        let entries = self.entries.read().await;
        let mut result = StoreQueryResult::default();
        for embedding in &embeddings {
            let mut ranked: Vec<(f32, &StoredEntry)> = entries
                .iter()
                .map(|entry| (cosine_distance(&entry.embedding, embedding), entry))
                .collect();
            ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(n_results);

            result.ids.push(ranked.iter().map(|(_, e)| e.id.clone()).collect());
            result.documents.push(ranked.iter().map(|(_, e)| e.document.clone()).collect());
            result.metadatas.push(ranked.iter().map(|(_, e)| e.metadata.clone()).collect());
            result.distances.push(ranked.iter().map(|(d, _)| *d).collect());
        }
        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::embedding::HashEmbeddingProvider;

    fn store() -> InMemoryChunkStore {
        InMemoryChunkStore::new(Arc::new(HashEmbeddingProvider::new(64)))
    }

    fn meta(source: &str) -> Metadata {
        json!({ "source": source, "chunk_index": 0 }).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() {
        let store = store();
        store
            .add(
                &["rust memory safety".into(), "python notebooks".into()],
                &[meta("a"), meta("b")],
                &["a_0".into(), "b_0".into()],
            )
            .await
            .unwrap();

        let result = store.query(&["memory safety in rust"], 2).await.unwrap();
        assert_eq!(result.ids, vec![vec!["a_0".to_string(), "b_0".to_string()]]);
        assert!(result.distances[0][0] <= result.distances[0][1]);
    }

    #[tokio::test]
    async fn duplicate_ids_reject_the_whole_batch() {
        let store = store();
        store.add(&["one".into()], &[meta("a")], &["x".into()]).await.unwrap();
        let err = store
            .add(
                &["two".into(), "three".into()],
                &[meta("a"), meta("a")],
                &["y".into(), "x".into()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::StoreWriteError { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mismatched_batch_is_rejected() {
        let err = store().add(&["one".into()], &[], &["x".into()]).await.unwrap_err();
        assert!(matches!(err, RagError::StoreWriteError { .. }));
    }

    #[tokio::test]
    async fn empty_store_returns_empty_hits() {
        let result = store().query(&[""], 5).await.unwrap();
        assert_eq!(result.documents, vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(32));

        let store = InMemoryChunkStore::open(dir.path(), "docs", embedder.clone()).await.unwrap();
        store.add(&["kept text".into()], &[meta("k")], &["k_0".into()]).await.unwrap();
        drop(store);

        let reopened = InMemoryChunkStore::open(dir.path(), "docs", embedder).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.query(&["kept"], 1).await.unwrap();
        assert_eq!(hits.documents[0], vec!["kept text".to_string()]);
    }

    #[tokio::test]
    async fn failed_snapshot_rolls_back_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(32));

        let store = InMemoryChunkStore::open(&data_dir, "docs", embedder).await.unwrap();
        store.add(&["first".into()], &[meta("a")], &["a_0".into()]).await.unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        let err = store.add(&["second".into()], &[meta("b")], &["b_0".into()]).await.unwrap_err();
        assert!(matches!(err, RagError::StoreWriteError { .. }));
        assert_eq!(store.count().await.unwrap(), 1);

        let hits = store.query(&["second"], 5).await.unwrap();
        assert_eq!(hits.ids[0], vec!["a_0".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_all_reach_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(32));
        let store =
            Arc::new(InMemoryChunkStore::open(dir.path(), "docs", embedder.clone()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let readers = store.query(&["anything"], 3).await.map(|_| ());
                let added = store
                    .add(&[format!("text {i}")], &[meta("c")], &[format!("c_{i}")])
                    .await;
                readers.and(added)
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        drop(store);

        let reopened = InMemoryChunkStore::open(dir.path(), "docs", embedder).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 8);
    }
}
