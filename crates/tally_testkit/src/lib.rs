//! # Tally Testkit
//!
//! Test utilities for Tally.
//!
//! This crate provides:
//! - An in-memory fake server with fault and latency injection
//! - A sync engine wired to in-memory collaborators
//! - Sample records and a fault-injecting ledger store
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn uploads_new_category() {
//!     let t = TestEngine::new();
//!     t.store.upsert(sample_category("Rent").into()).unwrap();
//!
//!     let result = t.engine.perform_full_sync().await;
//!     assert!(result.is_success());
//!     assert_eq!(t.remote.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
