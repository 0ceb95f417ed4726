//! Text generation contract.

use async_trait::async_trait;

use crate::error::Result;

/// An external prompt-to-text service.
///
/// The answer composer owns the timeout and retry policy; implementations
/// only translate a prompt into one backend call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`](crate::RagError::GenerationError)
    /// or [`RagError::GenerationTimeout`](crate::RagError::GenerationTimeout)
    /// when the backend fails.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
