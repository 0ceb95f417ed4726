//! Data types for documents, chunks, queries and retrieved results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RagError, Result};

/// Opaque identifier generated once per uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier of the chunk at `ordinal` within this document.
    pub fn chunk_id(&self, ordinal: usize) -> String {
        format!("{}_{ordinal}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Uploaded file bytes together with the name the client gave them.
///
/// Lives only for the duration of an upload request.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// The display name, usually the uploaded filename.
    pub name: String,
    /// The raw file contents.
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Create a raw document from a filename and its bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// Size of the raw upload in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// A bounded slice of a document's text, the unit of indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `"{document_id}_{chunk_index}"`.
    pub chunk_id: String,
    /// The chunk text.
    pub text: String,
    /// Display name of the document the chunk came from.
    pub source_document_name: String,
    /// The document the chunk belongs to.
    pub document_id: DocumentId,
    /// Zero-based ordinal assigned at chunking time.
    pub chunk_index: usize,
    /// Length of `text` in characters.
    pub length: usize,
    /// When the chunk was created.
    pub created_at: DateTime<Utc>,
    /// Encoding detected for the source document (informational).
    pub encoding: String,
}

/// Chunk input accepted at the ingestion boundary.
///
/// Callers may hand over bare strings or records that already carry an id.
/// Either form is normalized into a [`Chunk`] by [`DocumentContext::chunk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkInput {
    /// Plain chunk text; the id is derived from the ordinal.
    Text(String),
    /// A record with an optional caller-supplied id.
    Record {
        /// Caller-supplied chunk id. Blank ids are replaced by the derived one.
        #[serde(default)]
        id: Option<String>,
        /// The chunk text.
        text: String,
    },
}

impl From<String> for ChunkInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ChunkInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Per-document fields shared by every chunk of one upload.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    /// The document id.
    pub document_id: DocumentId,
    /// The display name of the document.
    pub source_name: String,
    /// The detected encoding of the document.
    pub encoding: String,
    /// Upload time, stamped on every chunk.
    pub created_at: DateTime<Utc>,
}

impl DocumentContext {
    /// Create a context for a freshly uploaded document.
    pub fn new(
        document_id: DocumentId,
        source_name: impl Into<String>,
        encoding: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            source_name: source_name.into(),
            encoding: encoding.into(),
            created_at: Utc::now(),
        }
    }

    /// Normalize one chunk input at position `ordinal` into a [`Chunk`].
    pub fn chunk(&self, ordinal: usize, input: ChunkInput) -> Chunk {
        let (id, text) = match input {
            ChunkInput::Text(text) => (None, text),
            ChunkInput::Record { id, text } => (id.filter(|id| !id.trim().is_empty()), text),
        };
        Chunk {
            chunk_id: id.unwrap_or_else(|| self.document_id.chunk_id(ordinal)),
            length: text.chars().count(),
            text,
            source_document_name: self.source_name.clone(),
            document_id: self.document_id.clone(),
            chunk_index: ordinal,
            created_at: self.created_at,
            encoding: self.encoding.clone(),
        }
    }

    /// Normalize a whole chunk sequence, numbering it in order.
    pub fn chunks<I>(&self, inputs: I) -> Vec<Chunk>
    where
        I: IntoIterator,
        I::Item: Into<ChunkInput>,
    {
        inputs.into_iter().enumerate().map(|(i, input)| self.chunk(i, input.into())).collect()
    }
}

/// A retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The question text.
    pub text: String,
    /// How many chunks to retrieve; always positive.
    pub top_k: usize,
}

impl Query {
    /// Create a query, rejecting a zero `top_k`.
    pub fn new(text: impl Into<String>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::InvalidRequest("top_k must be a positive integer".to_string()));
        }
        Ok(Self { text: text.into(), top_k })
    }
}

/// A chunk returned by the retriever, in store ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk text.
    pub text: String,
    /// Display name of the source document.
    pub source_document_name: String,
    /// Ordinal of the chunk within its document.
    pub chunk_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DocumentContext {
        DocumentContext::new(DocumentId::from("doc"), "notes.pdf", "utf-8")
    }

    #[test]
    fn text_inputs_get_ordinal_ids() {
        let chunks = context().chunks(["alpha", "beta"]);
        assert_eq!(chunks[0].chunk_id, "doc_0");
        assert_eq!(chunks[1].chunk_id, "doc_1");
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].length, 4);
        assert_eq!(chunks[1].source_document_name, "notes.pdf");
    }

    #[test]
    fn record_ids_are_kept_unless_blank() {
        let ctx = context();
        let kept = ctx.chunk(3, ChunkInput::Record { id: Some("custom".into()), text: "x".into() });
        assert_eq!(kept.chunk_id, "custom");
        let blank = ctx.chunk(4, ChunkInput::Record { id: Some("  ".into()), text: "x".into() });
        assert_eq!(blank.chunk_id, "doc_4");
    }

    #[test]
    fn chunk_input_accepts_both_json_shapes() {
        let inputs: Vec<ChunkInput> =
            serde_json::from_str(r#"["plain", {"id": "doc_1", "text": "rich"}, {"text": "bare"}]"#)
                .unwrap();
        assert_eq!(inputs[0], ChunkInput::Text("plain".into()));
        assert_eq!(inputs[1], ChunkInput::Record { id: Some("doc_1".into()), text: "rich".into() });
        assert_eq!(inputs[2], ChunkInput::Record { id: None, text: "bare".into() });
    }

    #[test]
    fn length_counts_characters() {
        let chunk = context().chunk(0, "héllo".into());
        assert_eq!(chunk.length, 5);
    }

    #[test]
    fn zero_top_k_is_invalid() {
        assert!(matches!(Query::new("q", 0), Err(RagError::InvalidRequest(_))));
        assert_eq!(Query::new("q", 2).unwrap().top_k, 2);
    }
}
