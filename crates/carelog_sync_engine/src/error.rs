//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync sessions.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol error (codec failure or invalid message).
    #[error("protocol error: {0}")]
    Protocol(#[from] carelog_sync_protocol::ProtocolError),

    /// Changelog error while applying or selecting entries.
    #[error("changelog error: {0}")]
    Changelog(#[from] carelog_core::CoreError),

    /// The partner rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// A session for this partner is already running.
    #[error("a session for partner {remote_id} is already active")]
    SessionActive {
        /// The busy partner.
        remote_id: String,
    },

    /// The session was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }
}
