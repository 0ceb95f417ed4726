//! Document Q&A pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the upload workflow (decode → chunk →
//! index) and the query workflow (retrieve → compose) around one shared
//! [`ChunkStore`] and one [`TextGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, InMemoryChunkStore, HashEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .store(Arc::new(InMemoryChunkStore::new(Arc::new(HashEmbeddingProvider::default()))))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let receipt = pipeline.upload(RawDocument::new("guide.pdf", bytes)).await?;
//! let answer = pipeline.query("How do I reset it?", 3).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::composer::AnswerComposer;
use crate::config::RagConfig;
use crate::decoder::{self, DecodedText, DocumentFormat};
use crate::document::{ChunkInput, DocumentContext, DocumentId, Query, RawDocument, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;
use crate::indexer::{ChunkIndexer, IndexReport};
use crate::pool::IndexingPool;
use crate::retriever::Retriever;
use crate::store::ChunkStore;

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    /// The generated document id.
    pub document_id: DocumentId,
    /// The uploaded filename.
    pub name: String,
    /// Size of the raw upload in bytes.
    pub size_bytes: usize,
    /// Number of chunks the document was split into.
    pub chunk_count: usize,
    /// How indexing went.
    pub index: IndexReport,
}

/// Result of a successful query.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated answer text.
    pub text: String,
    /// The chunks the answer was grounded in, best first.
    pub sources: Vec<RetrievedChunk>,
    /// Wall-clock time spent on retrieval and generation.
    pub elapsed: Duration,
}

/// The document Q&A pipeline.
///
/// Construct one via [`RagPipeline::builder()`]. The store handle is created
/// once by the caller and shared by indexing and retrieval.
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    store: Arc<dyn ChunkStore>,
    pool: IndexingPool,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the chunk store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Return a reference to the indexing pool.
    pub fn pool(&self) -> &IndexingPool {
        &self.pool
    }

    /// Decode, chunk and index an uploaded document.
    ///
    /// # Errors
    ///
    /// - [`RagError::DecodeError`] if the format is unsupported or the bytes are invalid;
    ///   the format comes from the bytes first, see [`DocumentFormat::detect`]
    /// - [`RagError::EmptyContent`] if the text is shorter than `min_text_chars`
    ///   or yields no chunks
    /// - [`RagError::StoreWriteError`] if the store accepted none of the chunks
    pub async fn upload(&self, raw: RawDocument) -> Result<UploadReceipt> {
        let RawDocument { name, bytes } = raw;
        let size_bytes = bytes.len();
        let format = DocumentFormat::detect(&name, &bytes)?;

        let DecodedText { text, encoding } =
            tokio::task::spawn_blocking(move || decoder::decode(&bytes, format))
                .await
                .map_err(|e| RagError::TaskFailed(format!("decode task: {e}")))??;

        if text.trim().chars().count() < self.config.min_text_chars {
            warn!(document.name = %name, "upload has no readable text");
            return Err(RagError::EmptyContent(
                "file appears to be empty or contains no readable text".to_string(),
            ));
        }

        let pieces = self.chunker.split(&text);
        if pieces.is_empty() {
            return Err(RagError::EmptyContent(
                "could not extract meaningful text chunks from the document".to_string(),
            ));
        }

        let chunk_count = pieces.len();
        let context = DocumentContext::new(DocumentId::generate(), name.as_str(), encoding.name());
        let document_id = context.document_id.clone();
        let inputs = pieces.into_iter().map(ChunkInput::Text).collect();
        let index = self.ingest(&context, inputs).await?;

        if index.stored == 0 {
            error!(document.id = %document_id, chunk_count, "store accepted no chunks");
            return Err(RagError::StoreWriteError {
                backend: self.store.backend().to_string(),
                message: format!("none of the {chunk_count} chunks could be stored"),
            });
        }

        info!(
            document.id = %document_id,
            document.name = %name,
            size_bytes,
            chunk_count,
            stored = index.stored,
            "document uploaded"
        );
        Ok(UploadReceipt { document_id, name, size_bytes, chunk_count, index })
    }

    /// Normalize pre-chunked input for one document and index it on the pool.
    ///
    /// Plain strings get ids `"{document_id}_{ordinal}"`; records keep their
    /// own id when it is not blank.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentBusy`] if the document is already being
    /// indexed and [`RagError::TaskFailed`] if the job died.
    pub async fn ingest(
        &self,
        context: &DocumentContext,
        inputs: Vec<ChunkInput>,
    ) -> Result<IndexReport> {
        let chunks = context.chunks(inputs);
        self.pool.submit(context.document_id.clone(), chunks)?.await
    }

    /// Retrieve the `top_k` chunks most relevant to `query_text`.
    pub async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retriever.search(query_text, top_k).await
    }

    /// Answer `query_text` from the `top_k` most relevant chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidRequest`] for `top_k == 0`, or the retrieval
    /// and generation errors of the underlying components.
    pub async fn query(&self, query_text: &str, top_k: usize) -> Result<Answer> {
        let started = Instant::now();
        let query = Query::new(query_text, top_k)?;

        let sources = self.retriever.search_query(&query).await?;
        let text = self.composer.compose(&query.text, &sources).await?;

        let elapsed = started.elapsed();
        info!(
            top_k,
            sources = sources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "query answered"
        );
        Ok(Answer { text, sources, elapsed })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `store` and `generator` are required. Without a `chunker`, a
/// [`FixedSizeChunker`] is built from the config's chunk size and overlap.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn ChunkStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the shared chunk store.
    pub fn store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the text generation backend.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store =
            self.store.ok_or_else(|| RagError::ConfigError("store is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let indexer = ChunkIndexer::new(Arc::clone(&store), config.batch_size)?;
        let pool = IndexingPool::new(indexer, config.index_workers)?;
        let retriever = Retriever::new(Arc::clone(&store));
        let composer = AnswerComposer::new(generator, config.generation_timeout());

        Ok(RagPipeline { config, chunker, store, pool, retriever, composer })
    }
}
