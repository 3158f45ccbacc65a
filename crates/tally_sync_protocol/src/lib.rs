//! # Tally Sync Protocol
//!
//! Wire messages and conflict types for Tally synchronization.
//!
//! This crate provides:
//! - Request and response bodies for the records API
//! - Route paths shared by clients and test servers
//! - `Conflict`, `ConflictPolicy` and `ConflictResolution`
//!
//! Records travel as JSON objects tagged by `entity_type`, with RFC 3339
//! timestamps. Deletions are tombstones (`is_deleted: true`).
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod messages;

pub use conflict::{Conflict, ConflictPolicy, ConflictResolution};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    decode, encode, routes, ApiErrorBody, CreateRecordResponse, ListQuery, RecordPage,
    UpdateRecordResponse, DEFAULT_PAGE_SIZE,
};
