//! Error types for the pulse-stream crate.

use std::time::Duration;

use crate::types::{ChannelKey, ChannelType};

/// Errors that can occur in the channel connection layer.
///
/// Configuration errors (`MissingToken`, `InvalidResource`, `Configuration`)
/// are fatal to the attempt and never retried; `Transport` errors are
/// transient and retried per the backoff policy.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// No auth token was obtainable at connection time
    #[error("No auth token available for channel {0}")]
    MissingToken(ChannelKey),

    /// A scoped channel was given a missing or malformed resource identifier
    #[error("Invalid resource id {id:?} for {channel_type} channel")]
    InvalidResource {
        /// The channel type that required a resource id
        channel_type: ChannelType,
        /// The rejected identifier (empty when absent)
        id: String,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The underlying stream failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from the stream transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection attempt failed before a stream was established
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// The server rejected the stream request
    #[error("Server returned HTTP {status}")]
    Http {
        /// HTTP status code from the rejection
        status: u16,
    },

    /// An established stream was interrupted or closed unexpectedly
    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    /// No traffic arrived within the configured heartbeat window
    #[error("Idle for more than {0:?} without traffic")]
    IdleTimeout(Duration),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Convenience type alias for Results using TransportError.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    #[test]
    fn stream_error_display() {
        let key = Channel::global().key();
        let error = StreamError::MissingToken(key);
        assert_eq!(error.to_string(), "No auth token available for channel global");

        let error = StreamError::InvalidResource {
            channel_type: ChannelType::Conversation,
            id: "undefined".to_string(),
        };
        assert!(error.to_string().contains("\"undefined\""));
        assert!(error.to_string().contains("conversation"));

        let error = StreamError::Configuration("bad base url".to_string());
        assert_eq!(error.to_string(), "Configuration error: bad base url");
    }

    #[test]
    fn transport_error_display() {
        let error = TransportError::Connect("connection refused".to_string());
        assert_eq!(error.to_string(), "Failed to connect: connection refused");

        let error = TransportError::Http { status: 401 };
        assert_eq!(error.to_string(), "Server returned HTTP 401");

        let error = TransportError::Interrupted("reset by peer".to_string());
        assert_eq!(error.to_string(), "Stream interrupted: reset by peer");
    }

    #[test]
    fn transport_error_converts_to_stream_error() {
        let transport = TransportError::Http { status: 502 };
        let error: StreamError = transport.into();

        match error {
            StreamError::Transport(e) => assert_eq!(e.to_string(), "Server returned HTTP 502"),
            _ => panic!("Expected Transport variant"),
        }
    }
}
