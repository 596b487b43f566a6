//! Error types for the subscription watcher
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the subscription watcher
#[derive(Error, Debug)]
pub enum Error {
    /// Fetcher-related errors (network failure, bad payload, timeout)
    ///
    /// Always transient: the cycle that hit it is abandoned and the next
    /// scheduled tick retries independently.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Broadcaster-related errors (delivery could not be confirmed)
    #[error("broadcast error: {0}")]
    Broadcast(String),

    /// State store-related errors
    #[error("state store error: {0}")]
    StateStore(String),

    /// Configuration errors (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a broadcast error
    pub fn broadcast(msg: impl Into<String>) -> Self {
        Self::Broadcast(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
