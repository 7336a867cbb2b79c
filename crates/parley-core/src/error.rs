//! Error types for parley-core
//!
//! Backend failures are absorbed at the store boundary and turned into
//! degraded results. Only caller errors and summarizer failures reach the
//! caller through [`Error`].

use thiserror::Error;

/// Backing store adapter error
#[derive(Debug, Error)]
pub enum BackendError {
    /// The availability flag is down; no call was attempted
    #[error("backing store unavailable")]
    Unavailable,

    /// Connection could not be established or was lost
    #[error("connection error: {0}")]
    Connection(String),

    /// A command was sent but failed
    #[error("command {command} failed: {message}")]
    Command {
        /// Command name (GET, SET, SCAN...)
        command: &'static str,
        /// Detailed message
        message: String,
    },
}

impl BackendError {
    /// Whether this error means the backing service is unreachable
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Connection(_))
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Operation requires an existing conversation
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Stored value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store failure
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Caller-supplied summarizer failed
    #[error("summarization failed: {0}")]
    Summarization(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
