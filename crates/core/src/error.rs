//! Error types for the Nakshatra domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Two "failure" shapes are deliberately NOT errors: an empty corpus and
//! an empty selection are modeled as outcomes (needs-baseline-data and
//! no-data) because they end in a normal user-facing reply, never a
//! failed request.

use thiserror::Error;

/// The top-level error type for all Nakshatra operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the primary chart document store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Store request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Failures from the vector index service.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Index request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Failures from the language model provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Failures interpreting a tool call from the model.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
