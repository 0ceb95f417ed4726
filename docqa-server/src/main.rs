//! # docqa-server
//!
//! Upload PDF or text documents and ask questions answered from their content.
//!
//! Usage:
//!   docqa-server                                  # in-memory store on 0.0.0.0:8000
//!   docqa-server --data-dir ./docqa_db            # persist chunks between runs
//!   docqa-server --embedding-model nomic-embed-text --log-json

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use docqa_rag::{
    ChunkStore, EmbeddingProvider, HashEmbeddingProvider, InMemoryChunkStore,
    OllamaEmbeddingProvider, OllamaGenerator, RagConfig, RagPipeline,
    ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL},
};
use docqa_server::{ServerConfig, run_server};
use docqa_telemetry::LogFormat;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "docqa-server", version, about = "Document question answering over HTTP")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "DOCQA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "DOCQA_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory for the chunk store snapshot; in-memory only when unset
    #[arg(long, env = "DOCQA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Collection name, used as the snapshot file name
    #[arg(long, env = "DOCQA_COLLECTION", default_value = "document_chunks")]
    collection: String,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_BASE_URL)]
    ollama_url: String,

    /// Generation model
    #[arg(long, env = "DOCQA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Ollama embedding model; offline hash embeddings when unset
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    #[arg(long, default_value_t = 50)]
    chunk_overlap: usize,

    /// Chunks per store write
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Documents indexed concurrently
    #[arg(long, default_value_t = 2)]
    index_workers: usize,

    /// Seconds to wait for one generation call
    #[arg(long, default_value_t = 60)]
    generation_timeout: u64,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Emit logs as JSON lines
    #[arg(long, env = "DOCQA_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Pretty };
    docqa_telemetry::init_telemetry("docqa-server", format)?;

    let config = RagConfig::builder()
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .batch_size(cli.batch_size)
        .index_workers(cli.index_workers)
        .generation_timeout_secs(cli.generation_timeout)
        .build()
        .context("invalid pipeline configuration")?;

    let embedder: Arc<dyn EmbeddingProvider> = match &cli.embedding_model {
        Some(model) => {
            info!(model = %model, "using ollama embeddings");
            Arc::new(OllamaEmbeddingProvider::new(&cli.ollama_url, model))
        }
        None => {
            info!("using offline hash embeddings");
            Arc::new(HashEmbeddingProvider::default())
        }
    };

    let store: Arc<dyn ChunkStore> = match &cli.data_dir {
        Some(dir) => Arc::new(
            InMemoryChunkStore::open(dir, &cli.collection, embedder)
                .await
                .with_context(|| format!("failed to open chunk store in {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryChunkStore::new(embedder)),
    };

    let generator = OllamaGenerator::with_timeout(
        &cli.ollama_url,
        &cli.model,
        Duration::from_secs(cli.generation_timeout),
    )?;

    let pipeline =
        RagPipeline::builder().config(config).store(store).generator(Arc::new(generator)).build()?;

    run_server(
        ServerConfig { host: cli.host, port: cli.port, max_upload_bytes: cli.max_upload_bytes },
        Arc::new(pipeline),
    )
    .await
}
