//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding, decoding, or validating protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message failed JSON encoding or decoding.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A decoded message is structurally invalid.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// What was wrong with it.
        message: String,
    },

    /// The peer speaks an incompatible protocol version.
    #[error("unsupported protocol version {got}, expected {expected}")]
    VersionMismatch {
        /// Version the peer announced.
        got: u16,
        /// Version this side speaks.
        expected: u16,
    },
}

impl ProtocolError {
    /// Creates an invalid-message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }
}

/// Result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
