//! Error types for the sync engine.

use tally_core::{CoreError, RecordId};
use tally_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Sync attempts never surface these directly: the engine folds them into a
/// [`crate::SyncResult`]. They appear on the remote client, ledger and
/// conflict-queue APIs.
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

    /// Malformed or invalid message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No token, or the server rejected it.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server failed to process the request (5xx or throttled).
    #[error("server error: {0}")]
    ServerError(String),

    /// Server rejected the request as invalid (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server's description.
        message: String,
    },

    /// Local store or ledger error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request exceeded the client timeout.
    #[error("operation timed out")]
    Timeout,

    /// Connectivity is unavailable.
    #[error("not connected to server")]
    NotConnected,

    /// `init` has not been called, or the engine was disposed.
    #[error("sync engine not initialized")]
    NotInitialized,

    /// Another operation holds the engine.
    #[error("sync already in progress")]
    Busy,

    /// No pending conflict for the record.
    #[error("no pending conflict for record {0}")]
    ConflictNotFound(RecordId),
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
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error ends the whole attempt.
    ///
    /// Any other error raised for a single record is counted against that
    /// record and the pass continues.
    pub fn aborts_attempt(&self) -> bool {
        matches!(
            self,
            SyncError::NotConnected | SyncError::AuthenticationFailed(_) | SyncError::Store(_)
        )
    }
}
