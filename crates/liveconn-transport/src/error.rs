//! Transport-specific error types

use thiserror::Error;
use std::io;

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be set up
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport no longer accepts outbound data
    #[error("Transport closed")]
    Closed,

    /// Bootstrap HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Bootstrap endpoint answered with an unusable body
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// Identity store could not be read or written
    #[error("Identity store error: {0}")]
    Store(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
