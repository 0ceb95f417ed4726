//! Answer composer: retrieved context plus question into one generation call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;

/// Separator placed between retrieved chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Build the generation prompt for `query` over `chunks`, in the given order.
pub fn build_prompt(query: &str, chunks: &[RetrievedChunk]) -> String {
    let context =
        chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    format!(
        "Use the following context to answer the question as accurately as possible.\n\n\
         Context:\n{context}\n\n\
         Question:\n{query}\n\n\
         Answer:"
    )
}

/// Sends retrieved context to a [`TextGenerator`] under a fixed timeout.
///
/// Failures are returned as-is; retrying is left to the caller.
#[derive(Clone)]
pub struct AnswerComposer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl AnswerComposer {
    /// Create a composer that gives each generation call at most `timeout`.
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Produce an answer to `query` grounded in `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationTimeout`] when the call exceeds the
    /// timeout and [`RagError::GenerationError`] when the backend fails.
    pub async fn compose(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<String> {
        let prompt = build_prompt(query, chunks);
        let backend = self.generator.name();

        match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(answer)) => {
                info!(
                    backend,
                    context_chunks = chunks.len(),
                    answer_len = answer.len(),
                    "answer generated"
                );
                Ok(answer)
            }
            Ok(Err(e)) => {
                error!(backend, error = %e, "generation failed");
                Err(match e {
                    RagError::GenerationError { .. } | RagError::GenerationTimeout(_) => e,
                    other => RagError::generation(backend, other.to_string()),
                })
            }
            Err(_) => {
                error!(backend, timeout_secs = self.timeout.as_secs(), "generation timed out");
                Err(RagError::GenerationTimeout(self.timeout.as_secs()))
            }
        }
    }
}
