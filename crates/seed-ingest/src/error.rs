//! Error types for the ingestion pipeline

use thiserror::Error;

use seed_common::SeedError;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures that stop a pipeline stage before it dispatches anything.
///
/// Per-record dispatch failures are not errors: they are retried, then
/// counted and dropped.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Common(#[from] SeedError),

    #[error("Source {key} could not be parsed: {reason}")]
    MalformedSource { key: String, reason: String },

    #[error("Blob store error: {0}")]
    Storage(String),
}

impl IngestError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self::Common(SeedError::Io(e))
    }
}
