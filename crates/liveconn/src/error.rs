//! Error types for the Live Connections client

use liveconn_proto::ProtocolError;
use liveconn_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum LiveConnError {
    /// Wire format errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session connection errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Transport, bootstrap and store errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session used out of order
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by [`ConnectionSession::send`](crate::ConnectionSession::send)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// No transport has been created yet
    #[error("Connection is not created")]
    NotCreated,

    /// Transport is closing or closed
    #[error("Connection is not open")]
    NotOpen,
}

/// Authentication failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The server did not acknowledge the session in time
    #[error("No acknowledgement after {waited:?}")]
    Rejected {
        /// How long the client waited
        waited: Duration,
    },
}

impl From<serde_json::Error> for LiveConnError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiveConnError::from(ConnectionError::NotCreated);
        assert_eq!(err.to_string(), "Connection error: Connection is not created");

        let err = LiveConnError::from(ProtocolError::UnknownType(9));
        assert!(err.to_string().starts_with("Protocol error: "));

        let err = LiveConnError::from(AuthError::Rejected {
            waited: Duration::from_millis(250),
        });
        assert_eq!(err.to_string(), "Authentication error: No acknowledgement after 250ms");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            LiveConnError::from(json_err),
            LiveConnError::Serialization(msg) if msg.starts_with("JSON error")
        ));
    }
}
