use serde::{Deserialize, Serialize};

use docqa_rag::UploadReceipt;

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

pub const UPLOAD_OK_MESSAGE: &str = "Document uploaded and processed successfully";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self { status: "healthy".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    /// Raw upload size in bytes.
    pub size: usize,
    pub chunk_count: usize,
    pub stored_count: usize,
    pub message: String,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        let message = if receipt.index.is_complete() {
            UPLOAD_OK_MESSAGE.to_string()
        } else {
            format!(
                "{UPLOAD_OK_MESSAGE} ({} of {} chunks stored)",
                receipt.index.stored, receipt.chunk_count
            )
        };
        Self {
            id: receipt.document_id.to_string(),
            name: receipt.name,
            size: receipt.size_bytes,
            chunk_count: receipt.chunk_count,
            stored_count: receipt.index.stored,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    /// Seconds spent on retrieval and generation.
    pub query_time: f64,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_rag::{DocumentId, IndexReport};

    #[test]
    fn query_request_defaults_top_k() {
        let request: QueryRequest = serde_json::from_str(r#"{"query":"what?"}"#).unwrap();
        assert_eq!(request.top_k, 3);

        let request: QueryRequest =
            serde_json::from_str(r#"{"query":"what?","top_k":7}"#).unwrap();
        assert_eq!(request.top_k, 7);
    }

    #[test]
    fn partial_upload_is_reported_in_message() {
        let receipt = UploadReceipt {
            document_id: DocumentId::from("d1"),
            name: "a.txt".into(),
            size_bytes: 10,
            chunk_count: 4,
            index: IndexReport {
                stored: 3,
                dropped_empty: 0,
                failed_batches: vec![docqa_rag::BatchFailure {
                    batch: 1,
                    chunks: 1,
                    reason: "disk full".into(),
                }],
            },
        };
        let response = UploadResponse::from(receipt);
        assert_eq!(response.id, "d1");
        assert_eq!(response.stored_count, 3);
        assert!(response.message.contains("3 of 4"));
    }
}
