//! Error types for the rentcal sync engine.

use thiserror::Error;

/// Errors that can occur while syncing feeds.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Feed returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Feed request timed out after {0}s")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Reconcile error: {0}")]
    Reconcile(String),

    #[error("Could not enumerate sources: {0}")]
    Enumeration(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether this error should abort a whole batch instead of a single
    /// source. Everything except source enumeration stays source-local.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Enumeration(_))
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
