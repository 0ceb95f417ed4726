//! `docqa-server` exposes the document Q&A pipeline over HTTP.
//! Documents are uploaded as multipart files and questions are posted as JSON.

pub mod protocol;
pub mod server;

pub use server::{ApiError, AppState, ServerConfig, app_router, run_server};
