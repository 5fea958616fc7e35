//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// Request to the backend failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No backend is registered for the model identifier
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The backend stream broke off mid-response
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<LLMError> for adk_core::Error {
    fn from(err: LLMError) -> Self {
        adk_core::Error::Model(err.to_string())
    }
}
