//! Error types for adk-core

use thiserror::Error;

/// Result type alias for adk-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent, session and runner operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Agent or service construction failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// No session exists for the given key
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session with the given key already exists
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    /// A lifecycle callback rejected the run
    #[error("Callback failed: {0}")]
    Callback(String),

    /// The inference backend failed or could not be resolved
    #[error("Model error: {0}")]
    Model(String),

    /// Tool dispatch failed
    #[error("Tool error: {0}")]
    Tool(String),

    /// A store could not read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// The invocation was cancelled by its caller
    #[error("Invocation cancelled")]
    Cancelled,

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
