//! campus-seed Common Library
//!
//! Shared types, logging and error handling for the campus-seed workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SeedError`] and the crate [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//! - **Types**: remote identifiers, identifier sets and raw source records
//!
//! # Example
//!
//! ```no_run
//! use seed_common::types::{IdentifierSet, RemoteId};
//!
//! let mut ids = IdentifierSet::new();
//! ids.push(RemoteId::from(42));
//! assert_eq!(ids.len(), 1);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SeedError};
pub use types::{IdentifierSet, RawRecord, RemoteId};
