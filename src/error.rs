//! Error types for lineupbot.

use thiserror::Error;

/// Common error type for lineupbot.
#[derive(Error, Debug)]
pub enum BotError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration or user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// URL title or feed lookup error.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Snapshot read/write error.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Snapshot(e.to_string())
    }
}

/// Result type alias for lineupbot operations.
pub type Result<T> = std::result::Result<T, BotError>;
