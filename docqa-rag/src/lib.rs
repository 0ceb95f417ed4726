//! # docqa-rag
//!
//! Chunking, indexing and retrieval pipeline for document question answering.
//!
//! Uploaded bytes are decoded to text, split into overlapping fixed-size
//! chunks, and indexed in batches into a similarity-indexed [`ChunkStore`].
//! Queries retrieve the top-K chunks from the same store and hand them to a
//! [`TextGenerator`] through the [`AnswerComposer`].
//!
//! ```text
//! bytes ─► decoder ─► chunker ─► ChunkIndexer (IndexingPool) ─► ChunkStore
//! query ─► Retriever ◄────────────────────────────────────────── ChunkStore
//!              └─► AnswerComposer ─► TextGenerator ─► answer
//! ```

pub mod chunking;
pub mod composer;
pub mod config;
pub mod decoder;
pub mod document;
pub mod embedding;
pub mod encoding;
pub mod error;
pub mod generation;
pub mod indexer;
pub mod inmemory;
pub mod ollama;
pub mod pipeline;
pub mod pool;
pub mod retriever;
pub mod store;

pub use chunking::{Chunker, FixedSizeChunker, chunk_text};
pub use composer::{AnswerComposer, build_prompt};
pub use config::{RagConfig, RagConfigBuilder};
pub use decoder::{DecodedText, DocumentFormat, decode};
pub use document::{
    Chunk, ChunkInput, DocumentContext, DocumentId, Query, RawDocument, RetrievedChunk,
};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use encoding::{TextEncoding, detect};
pub use error::{RagError, Result};
pub use generation::TextGenerator;
pub use indexer::{BatchFailure, ChunkIndexer, IndexReport};
pub use inmemory::InMemoryChunkStore;
pub use ollama::{OllamaEmbeddingProvider, OllamaGenerator};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder, UploadReceipt};
pub use pool::{IndexTask, IndexingPool};
pub use retriever::Retriever;
pub use store::{ChunkStore, Metadata, StoreQueryResult};
