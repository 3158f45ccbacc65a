//! Error types for Tally core.

use crate::record::RecordId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record and store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Store is already open in another process.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Store file is corrupted or has an unknown format.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Snapshot digest does not match its content.
    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    SnapshotChecksumMismatch {
        /// Digest recorded when the snapshot was taken.
        expected: String,
        /// Digest of the bytes presented for restore.
        actual: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}
