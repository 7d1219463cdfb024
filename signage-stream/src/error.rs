//! Error types for the signage-stream crate.

use std::time::Duration;

/// Errors raised by the transport layer.
///
/// None of these are fatal to a display: the supervisor answers every one of
/// them by degrading to polling and reconnecting with backoff.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The push channel could not be reached or dropped unexpectedly
    #[error("Connection error: {0}")]
    Connection(String),

    /// An HTTP pull failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebSocket layer failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame or response body could not be decoded
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A configured endpoint is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Nothing was received within the heartbeat window
    #[error("No frames received for {0:?}")]
    HeartbeatTimeout(Duration),

    /// A connect or pull exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The consumer of stream events went away
    #[error("Event channel closed")]
    ChannelClosed,
}

impl StreamError {
    /// Whether the error concerns a single payload rather than the channel.
    ///
    /// Malformed payloads are dropped; the channel stays up.
    pub fn is_malformed(&self) -> bool {
        matches!(self, StreamError::Decode(_))
    }
}

impl From<signage_model::ModelError> for StreamError {
    fn from(err: signage_model::ModelError) -> Self {
        match err {
            signage_model::ModelError::Malformed(e) => StreamError::Decode(e),
        }
    }
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;
