//! Ollama-backed text generation and embeddings.
//!
//! Both clients call the Ollama REST API directly with `reqwest`:
//! `POST /api/generate` for completions and `POST /api/embed` for embeddings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;

/// The default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default generation model.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// The default request timeout for generation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const BACKEND: &str = "ollama";

/// A [`TextGenerator`] backed by Ollama's `/api/generate` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaGenerator;
///
/// let generator = OllamaGenerator::new("http://localhost:11434", "llama3.2")?;
/// let answer = generator.generate("Why is the sky blue?").await?;
/// ```
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    /// Create a generator for `model` at `base_url` with the default 60 s timeout.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, model, DEFAULT_TIMEOUT)
    }

    /// Create a generator whose HTTP requests give up after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.into();
        if model.is_empty() {
            return Err(RagError::ConfigError("generation model must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url: trim_base(base_url.into()), model, timeout })
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
            model: model.into(),
        }
    }
}

fn trim_base(mut base_url: String) -> String {
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── Trait implementations ──────────────────────────────────────────

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(backend = BACKEND, model = %self.model, prompt_len = prompt.len(), "generating");

        let request = GenerateRequest { model: &self.model, prompt, stream: false };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(backend = BACKEND, error = %e, "generate request failed");
                if e.is_timeout() {
                    RagError::GenerationTimeout(self.timeout.as_secs())
                } else {
                    RagError::generation(BACKEND, format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(backend = BACKEND, %detail, "generate API error");
            return Err(RagError::generation(BACKEND, detail));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RagError::GenerationTimeout(self.timeout.as_secs())
            } else {
                RagError::generation(BACKEND, format!("failed to parse response: {e}"))
            }
        })?;
        Ok(body.response)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(BACKEND, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(backend = BACKEND, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbedRequest { model: &self.model, input: texts };
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(backend = BACKEND, error = %e, "embed request failed");
                RagError::embedding(BACKEND, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(backend = BACKEND, %detail, "embed API error");
            return Err(RagError::embedding(BACKEND, detail));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::embedding(BACKEND, format!("failed to parse response: {e}")))?;
        if body.embeddings.len() != texts.len() {
            return Err(RagError::embedding(
                BACKEND,
                format!("expected {} embeddings, got {}", texts.len(), body.embeddings.len()),
            ));
        }
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_disables_streaming() {
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "llama3.2", "prompt": "hi", "stream": false}));
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let generator = OllamaGenerator::new("http://host:11434//", "m").unwrap();
        assert_eq!(generator.base_url, "http://host:11434");
        assert_eq!(generator.model(), "m");
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(matches!(
            OllamaGenerator::new(DEFAULT_BASE_URL, ""),
            Err(RagError::ConfigError(_))
        ));
    }
}
