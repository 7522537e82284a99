//! Error types for tvsync-core

use thiserror::Error;

/// Result type alias using tvsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tvsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed identifier or payload shape. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Network-level failure talking to the remote store
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote call did not complete within the configured bound
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Remote store answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local key/value storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure happened below the HTTP layer and may succeed on retry.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
